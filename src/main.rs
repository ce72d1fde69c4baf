use std::process::ExitCode;
use std::sync::Arc;
use tab_warden::args::{Args, Mode};
use tab_warden::config::DetectionConfig;
use tab_warden::desktop::Desktop;
use tab_warden::game_automation::{
    AutomationEvent, AutomationHandle, GameAutomation, RunFlag, create_automation_channels,
};
use tokio::sync::mpsc;

#[cfg(feature = "desktop")]
fn os_desktop() -> Option<Arc<dyn Desktop>> {
    Some(Arc::new(tab_warden::desktop::XcapDesktop::new()))
}

#[cfg(not(feature = "desktop"))]
fn os_desktop() -> Option<Arc<dyn Desktop>> {
    None
}

fn log_event(event: &AutomationEvent) {
    match event {
        AutomationEvent::WindowsDetected(titles) => {
            log::info!("Watching {} window(s): {:?}", titles.len(), titles)
        }
        AutomationEvent::ScenarioResolved { tab, scenario, outcome } => {
            log::info!("✅ {scenario} on {tab}: {outcome:?}")
        }
        AutomationEvent::TickCompleted(summary) => log::info!(
            "Tick: {} window(s), {} tab(s), {} resolution(s) in {:.1}s",
            summary.windows,
            summary.tabs_visited,
            summary.resolutions,
            summary.elapsed.as_secs_f32()
        ),
        AutomationEvent::Error(e) => log::error!("❌ {e}"),
        other => log::debug!("{other:?}"),
    }
}

fn spawn_event_logger(mut events: mpsc::Receiver<AutomationEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    })
}

async fn watch(
    mut automation: GameAutomation,
    handle: AutomationHandle,
    events: mpsc::Receiver<AutomationEvent>,
    timeout_secs: Option<u64>,
) {
    let logger = spawn_event_logger(events);
    let task = tokio::spawn(async move { automation.run().await });
    handle.start().await;

    if let Some(secs) = timeout_secs {
        let timer_handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
            log::info!("⏱️ Timeout of {secs}s reached, shutting down");
            timer_handle.shutdown().await;
        });
    }

    let signal_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("🛑 Interrupted, shutting down");
            signal_handle.shutdown().await;
        }
    });

    if let Err(e) = task.await {
        log::error!("Automation task failed: {e}");
    }
    let _ = logger.await;
}

fn main() -> ExitCode {
    let Some(args) = Args::parse() else {
        return ExitCode::SUCCESS;
    };

    let default_level = if args.debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = match &args.config_path {
        Some(path) => match DetectionConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ {e}");
                return ExitCode::FAILURE;
            }
        },
        None => DetectionConfig::default(),
    };

    let desktop: Arc<dyn Desktop> = match (&args.mode, os_desktop()) {
        (_, Some(desktop)) => desktop,
        (Mode::CheckConfig, None) => Arc::new(tab_warden::desktop::NoDesktop),
        (_, None) => {
            eprintln!("❌ Built without the 'desktop' feature; only --check-config is available");
            return ExitCode::FAILURE;
        }
    };

    let (cmd_tx, cmd_rx, event_tx, event_rx) = create_automation_channels();
    let run_flag = RunFlag::default();
    let mut automation = match GameAutomation::new(&config, desktop, cmd_rx, event_tx, run_flag.clone()) {
        Ok(automation) => automation,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.mode == Mode::CheckConfig {
        println!(
            "✅ Config OK, scenarios: {}",
            automation.engine().scenario_names().join(", ")
        );
        return ExitCode::SUCCESS;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("❌ Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        match args.mode {
            Mode::Once => {
                run_flag.set(true);
                let logger = spawn_event_logger(event_rx);
                automation.run_tick().await;
                drop(automation);
                let _ = logger.await;
            }
            _ => {
                let handle = AutomationHandle::new(cmd_tx, run_flag);
                watch(automation, handle, event_rx, args.timeout_secs).await;
            }
        }
    });

    ExitCode::SUCCESS
}
