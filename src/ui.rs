use std::{num::NonZeroUsize, sync::Arc};

use eframe::{
    egui::{self, CentralPanel, ViewportBuilder},
    run_native, App, NativeOptions,
};
use ring_channel::{ring_channel, RingReceiver};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::{
    barcode_decoders::{FrameDecoder, QrDecoder},
    barcode_scanner::Preview,
    camera::{CaptureOpener, NokhwaOpener},
    config::{ConfigLoader, ScannerConfig},
};

use self::{
    display::{DisplayInput, DisplaySurface},
    scan_session::{Phase, StopReason},
    state_worker::StateWorker,
};

mod display;
#[cfg(test)]
mod headless;
mod scan_session;
mod state_worker;

pub(crate) const APP_TITLE: &str = "Barcode Reader";
pub(crate) const APP_ID: &str = "com.example.barcode";

#[derive(Debug, Default)]
struct State {
    scan_session: scan_session::State,
}

#[derive(Debug)]
enum Action {
    ScanSession(scan_session::Action),
}

struct Application {
    state: State,
    worker: StateWorker<Action>,

    rx: UnboundedReceiver<Action>,
    preview_rx: RingReceiver<Preview>,

    scan_session: scan_session::ScanSession,
    display: DisplaySurface,
}

impl Application {
    fn new(
        cc: &eframe::CreationContext,
        state: State,
        rx: UnboundedReceiver<Action>,
        worker: StateWorker<Action>,
        config: ScannerConfig,
    ) -> Self {
        Self::with_capture(
            cc.egui_ctx.clone(),
            state,
            rx,
            worker,
            Arc::new(NokhwaOpener),
            Arc::new(QrDecoder),
            config.device_index,
        )
    }

    fn with_capture(
        egui_ctx: egui::Context,
        state: State,
        rx: UnboundedReceiver<Action>,
        mut worker: StateWorker<Action>,
        opener: Arc<dyn CaptureOpener>,
        decoder: Arc<dyn FrameDecoder>,
        device_index: u32,
    ) -> Self {
        worker.set_egui_ctx(egui_ctx);

        let (preview_tx, preview_rx) = ring_channel::<Preview>(NonZeroUsize::MIN);

        Application {
            state,
            rx,
            preview_rx,
            scan_session: scan_session::ScanSession {
                worker: worker.scoped(Action::ScanSession),
                opener,
                decoder,
                device_index,
                preview: preview_tx,
            },
            display: DisplaySurface::new(),
            worker,
        }
    }

    fn dispatch(&mut self, action: Action) {
        tracing::debug!(?action, "got action");

        match action {
            Action::ScanSession(action) => {
                let before = self.state.scan_session.phase();

                self.scan_session
                    .update(&mut self.state.scan_session, action);

                self.display
                    .follow(before, self.state.scan_session.phase());
            }
        }

        tracing::debug!(state = ?self.state, "built new state");
    }

    fn ui(&mut self, ctx: &egui::Context) {
        while let Ok(action) = self.rx.try_recv() {
            self.dispatch(action);
        }

        if let Ok(preview) = self.preview_rx.try_recv() {
            self.display.set_frame(ctx, preview);
        }

        if ctx.input(|input| input.viewport().close_requested()) {
            tracing::info!("main window closing");
            self.dispatch(Action::ScanSession(scan_session::Action::Stop(
                StopReason::WindowClosed,
            )));
            self.worker.token().cancel();
        }

        let scanning = self.state.scan_session.phase() == Phase::Scanning;
        if let Some(input) = self.display.show(ctx, scanning) {
            let reason = match input {
                DisplayInput::QuitKey => StopReason::QuitKey,
                DisplayInput::Closed => StopReason::DisplayClosed,
            };

            self.dispatch(Action::ScanSession(scan_session::Action::Stop(reason)));
        }

        // Applied right away so the dialog never sees its own question again.
        if let Some(answer) = scan_session::continue_dialog(&self.state.scan_session, ctx) {
            self.dispatch(Action::ScanSession(
                scan_session::Action::ContinueAnswered(answer),
            ));
        }

        CentralPanel::default().show(ctx, |ui| {
            self.scan_session.render(&self.state.scan_session, ui);
        });

        ctx.request_repaint();
    }
}

impl App for Application {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui(ctx);
    }
}

pub(crate) fn show_ui() -> eyre::Result<()> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Action>();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let token = CancellationToken::new();
    let worker = StateWorker::new(rt.handle().clone(), tx, token);

    let mut config = ScannerConfig::default();
    if let Some(path) = crate::config::config_path() {
        rt.block_on(async {
            let loader = ConfigLoader::read_or_default(&path).await;
            if let Err(err) = loader.restore_object(&mut config).await {
                tracing::warn!("invalid scanner config, using defaults: {err}");
            }
        });
    }
    tracing::info!(?config, "loaded scanner config");

    let state = State::default();

    let options = NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_app_id(APP_ID)
            .with_inner_size([400.0, 180.0]),
        ..Default::default()
    };

    run_native(
        APP_TITLE,
        options,
        Box::new(move |cc| Box::new(Application::new(cc, state, rx, worker, config))),
    )
    .map_err(|err| eyre::eyre!("egui error: {err}"))?;

    Ok(())
}
