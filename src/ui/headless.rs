//! Drives an egui context without a window so UI code can be fed keys,
//! clicks, and close requests in tests.

use eframe::egui::{
    self, pos2, Event, FullOutput, Key, Modifiers, PointerButton, Pos2, RawInput, Rect, Shape,
    ViewportEvent, ViewportId,
};

const SCREEN_WIDTH: f32 = 800.0;
const SCREEN_HEIGHT: f32 = 600.0;
const GRID_STEP: f32 = 6.0;

pub(crate) struct Headless {
    ctx: egui::Context,
    time: f64,
}

impl Headless {
    pub(crate) fn new() -> Self {
        Self {
            ctx: egui::Context::default(),
            time: 0.0,
        }
    }

    pub(crate) fn ctx(&self) -> &egui::Context {
        &self.ctx
    }

    /// Run one frame with the given events.
    pub(crate) fn run<R>(&mut self, events: Vec<Event>, ui: impl FnOnce(&egui::Context) -> R) -> R {
        self.run_input(
            RawInput {
                events,
                ..Default::default()
            },
            ui,
        )
    }

    /// Run one frame in which the main window was asked to close.
    pub(crate) fn run_close_requested<R>(&mut self, ui: impl FnOnce(&egui::Context) -> R) -> R {
        let mut input = RawInput::default();
        if let Some(root) = input.viewports.get_mut(&ViewportId::ROOT) {
            root.events.push(ViewportEvent::Close);
        }

        self.run_input(input, ui)
    }

    /// Run one frame and return every shape it painted, nested lists
    /// flattened.
    pub(crate) fn paint(&mut self, ui: impl FnOnce(&egui::Context)) -> Vec<Shape> {
        let ((), output) = self.frame(RawInput::default(), ui);

        let mut shapes = Vec::new();
        let mut pending: Vec<Shape> = output
            .shapes
            .into_iter()
            .map(|clipped| clipped.shape)
            .collect();
        while let Some(shape) = pending.pop() {
            match shape {
                Shape::Vec(inner) => pending.extend(inner),
                shape => shapes.push(shape),
            }
        }

        shapes
    }

    fn run_input<R>(&mut self, input: RawInput, ui: impl FnOnce(&egui::Context) -> R) -> R {
        self.frame(input, ui).0
    }

    fn frame<R>(
        &mut self,
        mut input: RawInput,
        ui: impl FnOnce(&egui::Context) -> R,
    ) -> (R, FullOutput) {
        // Keep press and release of a click well inside the click duration.
        self.time += 0.05;

        input.screen_rect = Some(self.screen());
        input.time = Some(self.time);

        let mut out = None;
        let output = self.ctx.run(input, |ctx| out = Some(ui(ctx)));

        (out.expect("frame did not run"), output)
    }

    /// Press and release the primary button at `pos`, one frame each.
    /// Returns the first result the UI reports over those frames.
    pub(crate) fn click<R>(
        &mut self,
        pos: Pos2,
        mut ui: impl FnMut(&egui::Context) -> Option<R>,
    ) -> Option<R> {
        let button = |pressed| Event::PointerButton {
            pos,
            button: PointerButton::Primary,
            pressed,
            modifiers: Modifiers::NONE,
        };

        let pressed = self.run(vec![Event::PointerMoved(pos), button(true)], &mut ui);
        let released = self.run(vec![button(false)], &mut ui);

        pressed.or(released)
    }

    /// Click every point of a grid over `area`, row by row, until the UI
    /// reports a result.
    pub(crate) fn click_within<R>(
        &mut self,
        area: Rect,
        mut ui: impl FnMut(&egui::Context) -> Option<R>,
    ) -> Option<R> {
        let mut y = area.min.y;
        while y <= area.max.y {
            let mut x = area.min.x;
            while x <= area.max.x {
                if let Some(result) = self.click(pos2(x, y), &mut ui) {
                    return Some(result);
                }
                x += GRID_STEP;
            }
            y += GRID_STEP;
        }

        None
    }

    pub(crate) fn screen(&self) -> Rect {
        Rect::from_min_max(Pos2::ZERO, pos2(SCREEN_WIDTH, SCREEN_HEIGHT))
    }
}

pub(crate) fn key_press(key: Key) -> Event {
    Event::Key {
        key,
        physical_key: None,
        pressed: true,
        repeat: false,
        modifiers: Modifiers::NONE,
    }
}
