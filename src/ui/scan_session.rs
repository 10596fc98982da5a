use std::sync::Arc;

use eframe::egui::{self, Ui};
use egui_modal::Modal;
use futures::StreamExt;
use ring_channel::RingSender;
use tokio_util::sync::CancellationToken;

use crate::{
    barcode_decoders::{result_text, FrameDecoder},
    barcode_scanner::{Preview, ScanEvent, CAMERA_ERROR},
    camera::CaptureOpener,
};

use super::StateWorker;

pub(crate) const INITIAL_LABEL: &str = "Barcode result will appear here";
pub(crate) const SCANNING_LABEL: &str = "Press 'Q' to quit the camera.";
pub(crate) const STOPPED_LABEL: &str = "Camera stopped.";
pub(crate) const FINISHED_LABEL: &str = "Reading finished.";

pub(crate) const CONTINUE_DIALOG: &str = "continue_dialog";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Phase {
    #[default]
    Idle,
    Scanning,
    AwaitingContinue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    QuitKey,
    DisplayClosed,
    WindowClosed,
}

#[derive(Debug)]
pub(crate) enum Action {
    StartPressed,
    Scan(ScanEvent),
    Stop(StopReason),
    ContinueAnswered(bool),
}

/// Work the controller has to do after a state change.
#[derive(Debug)]
pub(crate) enum Effect {
    StartSession(CancellationToken),
}

#[derive(Debug)]
pub(crate) struct State {
    phase: Phase,
    label: String,
    session_token: Option<CancellationToken>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            label: INITIAL_LABEL.to_string(),
            session_token: None,
        }
    }
}

impl State {
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    fn begin_session(&mut self) -> Effect {
        let token = CancellationToken::new();

        self.phase = Phase::Scanning;
        self.label = SCANNING_LABEL.to_string();
        self.session_token = Some(token.clone());

        Effect::StartSession(token)
    }

    fn end_session(&mut self) {
        self.phase = Phase::Idle;
        if let Some(token) = self.session_token.take() {
            token.cancel();
        }
    }

    pub(crate) fn reduce(&mut self, action: Action) -> Option<Effect> {
        match action {
            Action::StartPressed if self.phase == Phase::Idle => Some(self.begin_session()),
            Action::StartPressed => {
                tracing::debug!(phase = ?self.phase, "ignoring start while busy");
                None
            }
            Action::Scan(ScanEvent::Opened) => {
                tracing::info!("camera opened");
                None
            }
            Action::Scan(_) if self.phase != Phase::Scanning => {
                tracing::debug!(phase = ?self.phase, "ignoring event from ended session");
                None
            }
            Action::Scan(ScanEvent::Found(detections)) => {
                self.session_token = None;

                match result_text(&detections) {
                    Some(text) => {
                        self.label = format!("Code found: {text}");
                        self.phase = Phase::AwaitingContinue;
                    }
                    None => {
                        self.label = STOPPED_LABEL.to_string();
                        self.phase = Phase::Idle;
                    }
                }
                None
            }
            Action::Scan(ScanEvent::Failed(message)) => {
                self.end_session();
                self.label = message;
                None
            }
            Action::Scan(ScanEvent::Stopped) => {
                self.end_session();
                self.label = STOPPED_LABEL.to_string();
                None
            }
            Action::Stop(StopReason::WindowClosed) => {
                self.end_session();
                None
            }
            Action::Stop(reason) => {
                // The session reports `Stopped` once the loop notices.
                if let Some(token) = self.session_token.as_ref() {
                    tracing::info!(?reason, "stopping scan session");
                    token.cancel();
                }
                None
            }
            Action::ContinueAnswered(true) if self.phase == Phase::AwaitingContinue => {
                Some(self.begin_session())
            }
            Action::ContinueAnswered(false) if self.phase == Phase::AwaitingContinue => {
                self.phase = Phase::Idle;
                self.label = FINISHED_LABEL.to_string();
                None
            }
            Action::ContinueAnswered(_) => None,
        }
    }
}

pub(crate) struct ScanSession {
    pub(crate) worker: StateWorker<Action>,
    pub(crate) opener: Arc<dyn CaptureOpener>,
    pub(crate) decoder: Arc<dyn FrameDecoder>,
    pub(crate) device_index: u32,
    pub(crate) preview: RingSender<Preview>,
}

impl ScanSession {
    pub(crate) fn update(&self, state: &mut State, action: Action) {
        self.worker.apply(state, action, |state, action| {
            if let Some(effect) = state.reduce(action) {
                self.run(effect);
            }
        });
    }

    fn run(&self, effect: Effect) {
        match effect {
            Effect::StartSession(token) => {
                let opener = self.opener.clone();
                let decoder = self.decoder.clone();
                let device_index = self.device_index;
                let preview = self.preview.clone();

                self.worker.stream(async move {
                    let rx = crate::barcode_scanner::start_session(
                        token,
                        opener,
                        decoder,
                        device_index,
                        preview,
                    );

                    tokio_stream::wrappers::ReceiverStream::new(rx).map(Action::Scan)
                });
            }
        }
    }

    pub(crate) fn render(&self, state: &State, ui: &mut Ui) {
        ui.add_enabled_ui(state.phase == Phase::Idle, |ui| {
            if ui.button("Start Camera").clicked() {
                self.worker.send(Action::StartPressed);
            }
        });

        ui.add_space(10.0);

        let label = ui.label(state.label());
        if state.label == CAMERA_ERROR {
            label.on_hover_text("Press Start Camera to try again.");
        }
    }
}

/// Show the continuation dialog while the session awaits an answer and
/// return the answer if one was clicked this frame.
///
/// The answer must be applied before the next frame. The dialog closes
/// whenever the state isn't awaiting one, so a stale dialog can't outlive
/// its question.
pub(crate) fn continue_dialog(state: &State, ctx: &egui::Context) -> Option<bool> {
    let modal = Modal::new(ctx, CONTINUE_DIALOG);
    let mut answer = None;

    modal.show(|ui| {
        modal.title(ui, "Continue?");
        modal.frame(ui, |ui| {
            modal.body(ui, "Do you want to read another barcode?");
        });
        modal.buttons(ui, |ui| {
            if modal.suggested_button(ui, "Yes").clicked() {
                answer = Some(true);
            }
            if modal.caution_button(ui, "No").clicked() {
                answer = Some(false);
            }
        });
    });

    let awaiting = state.phase == Phase::AwaitingContinue && answer.is_none();
    match (awaiting, modal.is_open()) {
        (true, false) => modal.open(),
        (false, true) => modal.close(),
        _ => (),
    }

    answer
}
