use eframe::egui::{
    self, load::SizedTexture, pos2, vec2, Align2, CentralPanel, Color32, ColorImage, FontId,
    Image, Key, TextureHandle, TextureOptions, Ui, ViewportBuilder, ViewportClass, ViewportId,
    Window,
};

use crate::{
    annotate::HIGHLIGHT,
    barcode_decoders::Detection,
    barcode_scanner::Preview,
};

use super::{scan_session::Phase, APP_TITLE};

const QUIT_KEY: Key = Key::Q;

/// What the user did to the display since the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DisplayInput {
    QuitKey,
    Closed,
}

/// The live camera window shown while a session is active, opened as its own
/// native viewport when the backend supports it.
pub(crate) struct DisplaySurface {
    texture: Option<TextureHandle>,
    detections: Vec<Detection>,
    frame_size: [usize; 2],
    open: bool,
}

impl DisplaySurface {
    pub(crate) fn new() -> Self {
        Self {
            texture: None,
            detections: Vec::new(),
            frame_size: [0, 0],
            open: false,
        }
    }

    pub(crate) fn set_frame(&mut self, ctx: &egui::Context, preview: Preview) {
        let (width, height) = preview.frame.dimensions();
        let size = [width as usize, height as usize];
        let image = ColorImage::from_rgb(size, preview.frame.as_raw());

        match self.texture.as_mut() {
            Some(texture) => texture.set(image, TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("camera-frame", image, TextureOptions::LINEAR))
            }
        }

        self.frame_size = size;
        self.detections = preview.detections;
    }

    /// Make the window visible for a new session, dropping the previous
    /// session's last frame.
    pub(crate) fn open(&mut self) {
        self.open = true;
        self.texture = None;
        self.detections.clear();
    }

    pub(crate) fn close(&mut self) {
        self.open = false;
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    /// Open the display when a session starts and close it once the shell is
    /// idle again. It stays up behind the continuation dialog.
    pub(crate) fn follow(&mut self, before: Phase, after: Phase) {
        match after {
            Phase::Scanning if before != Phase::Scanning => self.open(),
            Phase::Idle => self.close(),
            _ => (),
        }
    }

    /// Draw the display and report whether the user asked it to stop.
    /// `listening` controls whether the quit key and closing count as input.
    pub(crate) fn show(&mut self, ctx: &egui::Context, listening: bool) -> Option<DisplayInput> {
        if !self.is_open() {
            return None;
        }

        let builder = ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size([640.0, 480.0]);
        let viewport_id = ViewportId::from_hash_of("camera_display");

        let (closed, quit) =
            ctx.show_viewport_immediate(viewport_id, builder, |ctx, class| {
                let closed = if matches!(class, ViewportClass::Embedded) {
                    // Backend can't open another native window.
                    let mut open = true;
                    Window::new(APP_TITLE)
                        .open(&mut open)
                        .collapsible(false)
                        .resizable(true)
                        .default_size(vec2(640.0, 480.0))
                        .show(ctx, |ui| self.render(ui));
                    !open
                } else {
                    CentralPanel::default().show(ctx, |ui| self.render(ui));
                    ctx.input(|input| input.viewport().close_requested())
                };

                (closed, ctx.input(|input| input.key_pressed(QUIT_KEY)))
            });

        if closed {
            self.open = false;
            return listening.then_some(DisplayInput::Closed);
        }

        let quit = quit || ctx.input(|input| input.key_pressed(QUIT_KEY));
        (listening && quit).then_some(DisplayInput::QuitKey)
    }

    /// Draw the newest frame with each decoded text above its box. The boxes
    /// themselves are already part of the frame.
    fn render(&self, ui: &mut Ui) {
        let Some(texture) = self.texture.as_ref() else {
            ui.centered_and_justified(|ui| ui.spinner());
            return;
        };

        let [width, height] = self.frame_size;
        let available = ui.available_size();
        let scale = (available.x / width as f32)
            .min(available.y / height as f32)
            .max(0.1);
        let size = vec2(width as f32, height as f32) * scale;

        let response = ui.add(Image::new(SizedTexture::new(texture.id(), size)));
        let painter = ui.painter_at(response.rect);
        let color = Color32::from_rgb(HIGHLIGHT.0[0], HIGHLIGHT.0[1], HIGHLIGHT.0[2]);

        for detection in &self.detections {
            let x = response.rect.min.x + detection.rect.x as f32 * scale;
            let y = response.rect.min.y + (detection.rect.y as f32 - 10.0) * scale;

            painter.text(
                pos2(x, y),
                Align2::LEFT_BOTTOM,
                &detection.text,
                FontId::proportional(14.0),
                color,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eframe::egui::{Rect, Shape};
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::ui::headless::{key_press, Headless};

    fn preview(text: &str) -> Preview {
        Preview {
            frame: Arc::new(RgbImage::from_pixel(64, 48, Rgb([10, 20, 30]))),
            detections: vec![crate::barcode_scanner::tests::detection(text)],
        }
    }

    #[test]
    fn quit_key_is_reported_while_listening() {
        let mut headless = Headless::new();
        let mut display = DisplaySurface::new();
        display.open();

        assert_eq!(headless.run(vec![], |ctx| display.show(ctx, true)), None);
        assert_eq!(
            headless.run(vec![key_press(Key::Q)], |ctx| display.show(ctx, true)),
            Some(DisplayInput::QuitKey)
        );
        assert!(display.open);
    }

    #[test]
    fn quit_key_is_ignored_while_not_listening() {
        let mut headless = Headless::new();
        let mut display = DisplaySurface::new();
        display.open();

        let input = headless.run(vec![key_press(Key::Q)], |ctx| display.show(ctx, false));

        assert_eq!(input, None);
        assert!(display.open);
    }

    #[test]
    fn other_keys_are_ignored() {
        let mut headless = Headless::new();
        let mut display = DisplaySurface::new();
        display.open();

        let input = headless.run(vec![key_press(Key::W)], |ctx| display.show(ctx, true));

        assert_eq!(input, None);
    }

    #[test]
    fn closed_display_reports_nothing() {
        let mut headless = Headless::new();
        let mut display = DisplaySurface::new();

        let input = headless.run(vec![key_press(Key::Q)], |ctx| display.show(ctx, true));

        assert_eq!(input, None);
    }

    #[test]
    fn closing_the_window_is_reported() {
        let mut headless = Headless::new();
        let mut display = DisplaySurface::new();
        display.open();

        headless.run(vec![], |ctx| display.set_frame(ctx, preview("ABC123")));
        for _ in 0..3 {
            assert_eq!(headless.run(vec![], |ctx| display.show(ctx, true)), None);
        }

        // The close button sits at the right end of the title bar.
        let title_bar = Rect::from_min_max(pos2(0.0, 0.0), pos2(800.0, 80.0));
        let input = headless.click_within(title_bar, |ctx| display.show(ctx, true));

        assert_eq!(input, Some(DisplayInput::Closed));
        assert!(!display.open);
        assert_eq!(headless.run(vec![], |ctx| display.show(ctx, true)), None);
    }

    #[test]
    fn overlay_adds_text_but_no_second_outline() {
        let mut headless = Headless::new();
        let mut display = DisplaySurface::new();
        display.open();

        headless.run(vec![], |ctx| display.set_frame(ctx, preview("ABC123")));
        for _ in 0..5 {
            headless.run(vec![], |ctx| display.show(ctx, true));
        }

        let shapes = headless.paint(|ctx| {
            display.show(ctx, true);
        });
        let highlight = Color32::from_rgb(HIGHLIGHT.0[0], HIGHLIGHT.0[1], HIGHLIGHT.0[2]);

        assert!(shapes
            .iter()
            .any(|shape| matches!(shape, Shape::Text(text) if text.galley.text() == "ABC123")));
        assert!(!shapes
            .iter()
            .any(|shape| matches!(shape, Shape::Rect(rect) if rect.stroke.color == highlight)));
    }

    #[test]
    fn follows_the_session_phase() {
        let mut display = DisplaySurface::new();

        display.follow(Phase::Idle, Phase::Scanning);
        assert!(display.open);

        display.follow(Phase::Scanning, Phase::AwaitingContinue);
        assert!(display.open);

        display.follow(Phase::AwaitingContinue, Phase::Idle);
        assert!(!display.open);

        display.follow(Phase::AwaitingContinue, Phase::Scanning);
        assert!(display.open);

        display.follow(Phase::Scanning, Phase::Idle);
        assert!(!display.open);
    }

    #[test]
    fn reopening_drops_the_previous_frame() {
        let mut headless = Headless::new();
        let mut display = DisplaySurface::new();
        display.open();

        headless.run(vec![], |ctx| display.set_frame(ctx, preview("ABC123")));
        assert!(display.texture.is_some());
        assert_eq!(display.frame_size, [64, 48]);

        display.close();
        display.follow(Phase::Idle, Phase::Scanning);

        assert!(display.texture.is_none());
        assert!(display.detections.is_empty());
    }
}
