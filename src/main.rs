mod config;
mod error;
mod io;
mod kernel;
mod logger;

use std::env;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info, log_enabled, trace, warn, Level};

use config::SimConfig;
use io::{loader, Devices, HostFileSystem, ScriptedConsole, StdConsole};
use kernel::{AutoRunner, Driver};

fn main() -> ExitCode {
    let config = match SimConfig::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}\n\n{}", err, config::USAGE);
            return ExitCode::from(2);
        }
    };

    if let Err(err) = logger::init(config.log_level) {
        eprintln!("failed to install logger: {}", err);
    }

    let scripted_console = config.scripted_input.as_ref().map(ScriptedConsole::new);
    let devices = match &scripted_console {
        Some(console) => Devices::new(console.clone(), HostFileSystem),
        None => Devices::new(StdConsole, HostFileSystem),
    };

    let mut driver = Driver::new(config.scheduling_algorithm(), devices)
        .with_memory_reclamation(config.reclaim_terminated_memory);

    let mut loaded = 0;
    for spec in &config.programs {
        let program = match loader::load_program(&spec.path, spec.arrival_tick) {
            Ok(program) => program,
            Err(err) => {
                error!("failed to load {}: {}", spec.path.display(), err);
                continue;
            }
        };

        if driver.add_process(&program).is_ok() {
            loaded += 1;
        }
    }

    if loaded == 0 {
        warn!("no programs loaded, nothing to run");
        return ExitCode::FAILURE;
    }

    info!("running {} processes under {}", loaded, driver.scheduler_name());

    let driver = match config.interval {
        Some(interval) => {
            let shared = Arc::new(Mutex::new(driver));
            let ticks = AutoRunner::start(shared.clone(), interval, config.max_ticks).wait();
            debug!("auto-run finished after {} ticks", ticks);
            shared
        }
        None => {
            driver.run(config.max_ticks);
            Arc::new(Mutex::new(driver))
        }
    };
    let driver = driver.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(console) = &scripted_console {
        for (pid, line) in console.transcript() {
            println!("Process {}: {}", pid, line);
        }
    }

    report(&driver);
    let halted = driver.is_halted();

    if halted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report(driver: &Driver) {
    let snapshot = driver.snapshot();
    info!("stopped at tick {} (halted: {})", driver.clock(), driver.is_halted());

    println!("... PID | State      | Priority | PC | Memory   | Arrival");
    println!("...-----|------------|----------|----|----------|--------");
    for process in &snapshot.processes {
        println!(
            "... {:3} | {:10} | {:8} | {:2} | {:2}..={:2} | {}",
            process.pid,
            process.state.as_str(),
            process.priority,
            process.pc,
            process.mem_low,
            process.mem_high,
            process.arrival_tick
        );
    }

    for resource in driver.resource_status() {
        info!(
            "resource '{}': value {}, holder {:?}, waiting {:?}",
            resource.name, resource.value, resource.current_holder, resource.waiting_pids
        );
    }

    for entry in driver.history() {
        debug!(
            "history tick {}: process {} {} priority {} pc {}",
            entry.tick, entry.pid, entry.state, entry.priority, entry.pc
        );
    }

    if log_enabled!(Level::Trace) {
        match serde_json::to_string(snapshot) {
            Ok(json) => trace!("snapshot {}", json),
            Err(err) => warn!("could not encode snapshot: {}", err),
        }
    }

    for (index, word) in driver.memory_view().iter().enumerate().filter(|(_, word)| word.allocated) {
        debug!("mem[{:2}] {} = {}", index, word.name.as_deref().unwrap_or("-"), word.value);
    }
}
