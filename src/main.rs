//! dock-peek - Dock window previews for macOS
//!
//! Application entry point: one-shot commands go through the CLI executor,
//! `run` owns the main thread and its run loop until SIGINT or SIGTERM.

use clap::Parser;
use dock_peek::{
    cli::{run_cli, Commands, DockPeekCli, DockPeekCliExecutor},
    clock::{Clock, SystemClock},
    config::{
        DispatchConfig, FilterConfig, RegistryConfig, SettingsProvider, SettingsStore,
        SettingsValidator,
    },
    logging::{init_logging, LogConfig, LogLevel},
    macos::{
        pointer_location, run_main_loop_once, DisplayProvider, EventDisposition,
        SystemAccessibility, SystemDisplayProvider, SystemDockAccessibility, SystemEventTap,
        SystemProcesses, SystemWindowServer,
    },
    models::{Point, Rect},
    permissions::{PermissionChecker, PermissionProvider, SystemPermissions},
    services::{
        ClickDispatcher, DispatchServices, IconHitTester, IconStripFilter,
        InputInterceptionFilter, WindowRegistry,
    },
    ui::HeadlessPreviewSurface,
    DockPeekError, Result,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, error, info, instrument, warn};

/// Main loop slice; bounds hover latency and teardown latency
const LOOP_SLICE: Duration = Duration::from_millis(16);
const SETTINGS_RELOAD_INTERVAL: Duration = Duration::from_secs(5);

/// Running application state. Lives on the main thread.
pub struct DockPeekApp {
    settings: Arc<SettingsStore>,
    dispatcher: Rc<RefCell<ClickDispatcher>>,
    filter: InputInterceptionFilter,
    clock: Arc<dyn Clock>,
    dispatch_config: DispatchConfig,
    shutdown: Arc<AtomicBool>,
}

impl DockPeekApp {
    #[instrument(skip_all)]
    pub fn new(executor: &DockPeekCliExecutor) -> Result<Self> {
        info!("dock-peek v{}", env!("CARGO_PKG_VERSION"));

        let settings = Arc::new(executor.open_settings()?);
        Self::report_settings(&settings);

        let permissions: Arc<dyn PermissionProvider> = Arc::new(SystemPermissions);
        Self::check_initial_permissions(&permissions);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let processes = Arc::new(SystemProcesses::new());
        let displays: Arc<dyn DisplayProvider> = Arc::new(SystemDisplayProvider::new());
        let dispatch_config = DispatchConfig::default();

        let registry = WindowRegistry::new(
            Box::new(SystemWindowServer::new()),
            Box::new(SystemAccessibility::new()),
            processes.clone(),
            displays.clone(),
            clock.clone(),
            RegistryConfig::default(),
        );
        let surface = HeadlessPreviewSurface::new(preview_frame(displays.as_ref()));
        let dispatcher = ClickDispatcher::new(
            DispatchServices {
                hit_tester: IconHitTester::new(
                    Box::new(SystemDockAccessibility::new()),
                    processes,
                    dispatch_config.max_ancestor_hops,
                ),
                strip: IconStripFilter::new(displays, dispatch_config.hidden_strip_band),
                registry,
                surface: Box::new(surface),
                settings: settings.clone(),
                clock: clock.clone(),
            },
            dispatch_config,
        );

        let filter = InputInterceptionFilter::new(
            Box::new(SystemEventTap::new()),
            permissions,
            FilterConfig::default(),
        );
        debug!("core services initialized");

        Ok(Self {
            settings,
            dispatcher: Rc::new(RefCell::new(dispatcher)),
            filter,
            clock,
            dispatch_config,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Pump the main run loop until a shutdown signal arrives
    #[instrument(skip_all)]
    pub fn run(&mut self) -> Result<()> {
        self.spawn_signal_listener()?;
        info!("dock-peek is watching the Dock");

        let mut last_hover_sample = self.clock.now();
        let mut last_settings_reload = self.clock.now();

        let mut busy = false;
        while !self.shutdown.load(Ordering::SeqCst) {
            // Unfinished preview work only gets a poll of pending events.
            run_main_loop_once(if busy { Duration::ZERO } else { LOOP_SLICE });
            let now = self.clock.now();

            if self.filter.service() {
                warn!("Dock click interception stopped; it resumes once accessibility access returns");
            }
            if self.filter.reinstall_due(now) {
                self.try_start_filter();
            }

            busy = self.dispatcher.borrow_mut().pump();

            let settings = self.settings.settings();
            if settings.hover_enabled
                && now.saturating_duration_since(last_hover_sample)
                    >= self.dispatch_config.hover_poll_interval
            {
                last_hover_sample = now;
                if let Some(point) = pointer_location() {
                    self.dispatcher.borrow_mut().on_hover_sample(point);
                }
            }

            if now.saturating_duration_since(last_settings_reload) >= SETTINGS_RELOAD_INTERVAL {
                last_settings_reload = now;
                if let Err(e) = self.settings.reload() {
                    warn!("Settings reload failed, keeping previous settings: {}", e);
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        info!("Shutting down dock-peek...");
        self.filter.stop();
        let mut dispatcher = self.dispatcher.borrow_mut();
        dispatcher.dismiss("shutdown");
        info!(
            metrics = ?dispatcher.registry().metrics(),
            filter = ?self.filter.stats(),
            "dock-peek shutdown complete"
        );
    }

    fn try_start_filter(&mut self) {
        let dispatcher = Rc::clone(&self.dispatcher);
        let decide = move |point: Point| match dispatcher.try_borrow_mut() {
            Ok(mut dispatcher) => dispatcher.on_mouse_down(point),
            // Re-entered from inside the dispatcher; let the OS have it.
            Err(_) => EventDisposition::Pass,
        };
        match self.filter.start(decide) {
            Ok(()) => info!("Dock click interception active"),
            Err(e) => debug!("Dock click interception unavailable: {:#}", e),
        }
    }

    fn report_settings(settings: &SettingsStore) {
        let current = settings.settings();
        match SettingsValidator::new() {
            Ok(validator) => {
                for finding in validator.validate(&current) {
                    warn!(field = finding.field, rule = finding.rule.name, "{}", finding.message);
                }
            }
            Err(e) => warn!("Settings validator unavailable: {}", e),
        }
        debug!(path = %settings.path().display(), ?current, "settings loaded");
    }

    fn check_initial_permissions(permissions: &Arc<dyn PermissionProvider>) {
        let summary = PermissionChecker::new(permissions.clone()).summary();
        if summary.can_function() {
            info!("{}", summary.description());
            return;
        }
        error!("{}", summary.description());
        for permission in summary.missing_required() {
            println!("\n{}", PermissionChecker::instructions(permission));
        }
    }

    fn spawn_signal_listener(&self) -> Result<()> {
        let shutdown = Arc::clone(&self.shutdown);
        std::thread::Builder::new()
            .name("dock-peek-signals".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start signal runtime: {}", e);
                        return;
                    }
                };
                if let Err(e) = runtime.block_on(wait_for_shutdown_signal()) {
                    error!("Failed to setup signal handlers: {}", e);
                }
                shutdown.store(true, Ordering::SeqCst);
            })?;
        Ok(())
    }
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = signal::ctrl_c() => {
                match res {
                    Ok(_) => info!("Received SIGINT (Ctrl+C)"),
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                }
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        match signal::ctrl_c().await {
            Ok(_) => info!("Received Ctrl+C"),
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    }

    Ok(())
}

/// Where the headless surface claims to be: a band above the Dock on the
/// primary display
fn preview_frame(displays: &dyn DisplayProvider) -> Rect {
    let Some(display) = displays
        .displays()
        .into_iter()
        .find(|display| display.is_primary)
    else {
        return Rect::default();
    };
    let usable = display.visible_frame;
    let width = (usable.size.width * 0.6).round();
    let height = (usable.size.height * 0.3).round();
    Rect::new(
        usable.min_x() + (usable.size.width - width) / 2.0,
        usable.max_y() - height,
        width,
        height,
    )
}

fn main() -> Result<()> {
    let cli = DockPeekCli::parse();
    let command = cli.command();

    let mut log_config = match command {
        Commands::Run => LogConfig::from_env(),
        _ => LogConfig::quiet().with_env_overrides(),
    };
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config).map_err(|e| {
        DockPeekError::ConfigurationError(format!("Failed to initialize logging: {}", e))
    })?;

    if command != Commands::Run {
        return run_cli(&cli);
    }

    let executor = DockPeekCliExecutor::new(cli.config.clone(), cli.json);
    let mut app = DockPeekApp::new(&executor)?;
    if let Err(e) = app.run() {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
