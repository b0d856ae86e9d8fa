//! The drawing pad's application state and the edits applied to it.
//!
//! A [`DrawingSession`] owns the surface, the tool settings, the history log
//! and the in-progress pointer gesture. Everything that would talk to a user
//! (text prompts, notifications, undo/redo affordances) goes through the
//! injected [`Effects`] handler.

use crate::config::{Config, MAX_BRUSH_WIDTH};
use crate::error::{DrawError, DrawResult};
use crate::fill::flood_fill;
use crate::gallery::SavedDrawing;
use crate::history::{History, RestoreRequest, Snapshot};
use crate::renderer::{Canvas, OverlayKind, Point, Renderer};
use crate::{Color, StampKind, Tool, ToolState};
use chrono::{DateTime, Utc};
use image::RgbaImage;

const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 5.0;

/// Side effects the session asks its host to perform.
pub trait Effects {
    /// Ask the user for text to place; `None` cancels.
    fn prompt_text(&mut self, _default: &str) -> Option<String> {
        None
    }

    fn notify(&mut self, _message: &str) {}

    /// Undo/redo availability after every history change.
    fn history_changed(&mut self, _can_undo: bool, _can_redo: bool) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoEffects;

impl Effects for NoEffects {}

/// Where the surface is displayed, in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Applied { index: usize },
    /// A newer request was issued (or an edit was recorded) meanwhile.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct Gesture {
    start: Point,
    last: Point,
}

pub struct DrawingSession {
    renderer: Renderer,
    history: History,
    tools: ToolState,
    zoom: f64,
    gesture: Option<Gesture>,
    pending: Option<RestoreRequest>,
    effects: Box<dyn Effects>,
}

impl DrawingSession {
    /// Start a session on a white surface, using the system font for text.
    pub fn new(config: &Config) -> DrawResult<Self> {
        let renderer = Renderer::new(config.canvas.width, config.canvas.height)?;
        Self::with_renderer(config, renderer)
    }

    /// Start a session whose text uses the built-in bitmap font.
    pub fn with_bitmap_font(config: &Config) -> DrawResult<Self> {
        let renderer = Renderer::with_font(config.canvas.width, config.canvas.height, None)?;
        Self::with_renderer(config, renderer)
    }

    pub fn with_renderer(config: &Config, renderer: Renderer) -> DrawResult<Self> {
        let mut session = Self {
            renderer,
            history: History::new(config.history.max_entries),
            tools: config.tool_state(),
            zoom: 1.0,
            gesture: None,
            pending: None,
            effects: Box::new(NoEffects),
        };
        session.renderer.canvas.fill(Color::WHITE);
        session.record()?;
        Ok(session)
    }

    pub fn with_effects(mut self, effects: Box<dyn Effects>) -> Self {
        self.effects = effects;
        self
    }

    pub fn canvas(&self) -> &Canvas {
        &self.renderer.canvas
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.renderer.canvas.surface
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.renderer.canvas.pixel(x, y)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn is_drawing(&self) -> bool {
        self.gesture.is_some()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tools.tool = tool;
    }

    pub fn set_color(&mut self, color: Color) {
        self.tools.color = color;
    }

    pub fn set_brush_width(&mut self, width: u32) {
        self.tools.brush_width = width.clamp(1, MAX_BRUSH_WIDTH);
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.tools.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn set_mirror(&mut self, mirror: bool) {
        self.tools.mirror = mirror;
    }

    /// Picking a stamp switches to the stamp tool.
    pub fn select_stamp(&mut self, stamp: StampKind) {
        self.tools.stamp = stamp;
        self.tools.tool = Tool::Stamp;
    }

    pub fn pointer_down(&mut self, at: Point) -> DrawResult<()> {
        if !at.is_finite() {
            return Err(DrawError::InvalidPoint { x: at.x, y: at.y });
        }
        // A second down without an up finishes the first gesture
        if self.gesture.is_some() {
            self.pointer_up()?;
        }
        self.settle_pending();
        self.renderer.canvas.clear_overlays();

        match self.tools.tool {
            Tool::Fill => {
                let color = self.tools.color;
                let written = flood_fill(
                    &mut self.renderer.canvas.surface,
                    at.x.floor() as i64,
                    at.y.floor() as i64,
                    color,
                    self.tools.opacity,
                );
                tracing::debug!(x = at.x, y = at.y, written, "flood fill");
                if written > 0 {
                    self.record()?;
                }
            }
            Tool::Text => {
                let text = self.effects.prompt_text("Hello World");
                if let Some(text) = text.filter(|t| !t.is_empty()) {
                    let size = self.tools.font_size();
                    self.renderer.draw_text(at, &text, size, self.tools.color);
                    self.record()?;
                }
            }
            Tool::Stamp => {
                let color = self.tools.color.with_opacity(self.tools.opacity);
                self.renderer.draw_stamp(at, self.tools.stamp, color);
                self.record()?;
            }
            Tool::Brush | Tool::Eraser => {
                self.gesture = Some(Gesture { start: at, last: at });
                self.stroke(at, at);
            }
            Tool::Shape => {
                self.gesture = Some(Gesture { start: at, last: at });
            }
        }
        Ok(())
    }

    /// Extend the current gesture. Only the new segment is drawn.
    pub fn pointer_move(&mut self, at: Point) {
        let Some(gesture) = self.gesture else {
            return;
        };
        if !at.is_finite() {
            tracing::warn!(x = at.x, y = at.y, "ignoring move to an invalid position");
            return;
        }

        match self.tools.tool {
            Tool::Brush | Tool::Eraser => self.stroke(gesture.last, at),
            Tool::Shape => {
                self.renderer.canvas.clear_overlays();
                let color = self.tools.color.with_opacity(self.tools.opacity);
                let width = self.tools.brush_width;
                self.renderer.stroke_rect(gesture.start, at, width, color);
            }
            _ => {}
        }

        self.gesture = Some(Gesture { last: at, ..gesture });
    }

    /// Finish the gesture: commit the overlays and record one snapshot.
    ///
    /// A restore requested mid-gesture lands first; the stroke goes on top.
    pub fn pointer_up(&mut self) -> DrawResult<()> {
        if self.gesture.take().is_none() {
            return Ok(());
        }
        self.settle_pending();
        self.renderer.canvas.commit_overlays();
        self.record()
    }

    /// Leaving the surface ends the gesture exactly like releasing it.
    pub fn pointer_leave(&mut self) -> DrawResult<()> {
        self.pointer_up()
    }

    pub fn clear(&mut self) -> DrawResult<()> {
        self.settle_pending();
        self.gesture = None;
        self.renderer.canvas.clear_overlays();
        self.renderer.canvas.fill(Color::WHITE);
        self.record()?;
        self.effects.notify("Canvas cleared");
        Ok(())
    }

    /// Replace the surface with a transparent one of the new size.
    pub fn resize(&mut self, width: u32, height: u32) -> DrawResult<()> {
        self.settle_pending();
        self.gesture = None;
        self.renderer.canvas = Canvas::new(width, height)?;
        tracing::info!(width, height, "canvas resized");
        self.record()
    }

    /// Load a saved drawing at its recorded size.
    pub fn load_drawing(&mut self, drawing: &SavedDrawing) -> DrawResult<()> {
        let image = drawing.decode()?;
        self.settle_pending();
        self.gesture = None;

        let mut canvas = Canvas::new(drawing.width, drawing.height)?;
        for (x, y, pixel) in image.enumerate_pixels() {
            if x < canvas.width && y < canvas.height {
                canvas.surface.put_pixel(x, y, *pixel);
            }
        }
        self.renderer.canvas = canvas;
        self.record()?;
        self.effects.notify(&format!("Loaded: {}", drawing.name));
        Ok(())
    }

    /// Step back one snapshot. The surface changes once the request is finished.
    pub fn undo(&mut self) -> Option<RestoreRequest> {
        let request = self.history.undo()?;
        Some(self.track(request))
    }

    pub fn redo(&mut self) -> Option<RestoreRequest> {
        let request = self.history.redo()?;
        Some(self.track(request))
    }

    /// Jump to any history entry without recording.
    pub fn restore(&mut self, index: usize) -> DrawResult<RestoreRequest> {
        let request = self.history.restore(index)?;
        Ok(self.track(request))
    }

    /// Apply a decoded restore if it is still the latest request.
    ///
    /// A decode failure leaves the surface untouched.
    pub fn finish_restore(&mut self, request: RestoreRequest) -> DrawResult<RestoreOutcome> {
        if !self.history.is_current(request.token) {
            tracing::debug!(
                token = request.token,
                index = request.index,
                "discarding stale restore"
            );
            return Ok(RestoreOutcome::Stale);
        }
        if self.pending.as_ref().map(|p| p.token) == Some(request.token) {
            self.pending = None;
        }

        let image = request.decode().map_err(|err| {
            tracing::error!(index = request.index, error = %err, "snapshot could not be decoded");
            err
        })?;
        self.history.settle(request.token);
        self.renderer.canvas.replace(image);
        Ok(RestoreOutcome::Applied { index: request.index })
    }

    /// Finish whatever restore is still pending.
    pub fn settle_pending(&mut self) {
        if let Some(request) = self.pending.take() {
            if let Err(err) = self.finish_restore(request) {
                tracing::warn!(error = %err, "pending restore dropped");
            }
        }
    }

    pub fn undo_now(&mut self) -> DrawResult<bool> {
        match self.undo() {
            Some(request) => Ok(self.finish_restore(request)? != RestoreOutcome::Stale),
            None => Ok(false),
        }
    }

    pub fn redo_now(&mut self) -> DrawResult<bool> {
        match self.redo() {
            Some(request) => Ok(self.finish_restore(request)? != RestoreOutcome::Stale),
            None => Ok(false),
        }
    }

    /// Record for the gallery from the current surface.
    pub fn saved_drawing(
        &mut self,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> DrawResult<SavedDrawing> {
        self.settle_pending();
        SavedDrawing::from_surface(name, self.surface(), now)
    }

    /// PNG bytes of the surface with a dated download name.
    pub fn export_png(&mut self, now: DateTime<Utc>) -> DrawResult<(String, Vec<u8>)> {
        self.settle_pending();
        let bytes = crate::codec::encode_png(self.surface())?;
        Ok((export_file_name(now), bytes))
    }

    pub fn notify(&mut self, message: &str) {
        self.effects.notify(message);
    }

    pub fn zoom(&mut self, delta: f64) -> f64 {
        let zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
        self.zoom = (zoom * 10.0).round() / 10.0;
        self.zoom
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom
    }

    /// Map a client position to surface coordinates through the displayed rectangle.
    pub fn to_canvas(&self, client_x: f64, client_y: f64, viewport: &Viewport) -> Point {
        let canvas = &self.renderer.canvas;
        let scale_x = canvas.width as f64 / viewport.width;
        let scale_y = canvas.height as f64 / viewport.height;
        Point::new((client_x - viewport.left) * scale_x, (client_y - viewport.top) * scale_y)
    }

    /// Pixel position shown in the cursor readout at the current zoom.
    pub fn cursor_readout(&self, client_x: f64, client_y: f64, viewport: &Viewport) -> (i64, i64) {
        (
            ((client_x - viewport.left) / self.zoom).round() as i64,
            ((client_y - viewport.top) / self.zoom).round() as i64,
        )
    }

    fn stroke(&mut self, from: Point, to: Point) {
        let width = self.tools.brush_width;
        let color = self.tools.stroke_color().with_opacity(self.tools.opacity);
        self.renderer.stroke_segment(OverlayKind::Primary, from, to, width, color);

        if self.tools.mirror {
            let center_x = self.renderer.canvas.width as f64 / 2.0;
            let mirror = |p: Point| Point::new(2.0 * center_x - p.x, p.y);
            let (from, to) = (mirror(from), mirror(to));
            self.renderer.stroke_segment(OverlayKind::Mirror, from, to, width, color);
        }
    }

    fn record(&mut self) -> DrawResult<()> {
        let snapshot = Snapshot::capture(&self.renderer.canvas.surface)?;
        self.pending = None;
        self.history.record(snapshot);
        self.effects.history_changed(self.history.can_undo(), self.history.can_redo());
        Ok(())
    }

    fn track(&mut self, request: RestoreRequest) -> RestoreRequest {
        self.pending = Some(request.clone());
        self.effects.history_changed(self.history.can_undo(), self.history.can_redo());
        request
    }
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("drawing_{}.png", now.format("%Y-%m-%d"))
}
