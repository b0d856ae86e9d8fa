//! Replay of recorded drawing sessions.
//!
//! A script is a JSON array of actions mirroring what the page would
//! receive from the user: tool changes, pointer events, prompts, history
//! navigation and gallery calls.

use crate::gallery::Gallery;
use crate::renderer::Point;
use crate::session::{DrawingSession, Effects};
use crate::{Color, StampKind, Tool};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Tool { tool: Tool },
    Color { color: String },
    BrushWidth { width: u32 },
    Opacity { opacity: f64 },
    Mirror { enabled: bool },
    Stamp { stamp: StampKind },
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up,
    Leave,
    /// Down at the first point, move through the rest, then up.
    Stroke { points: Vec<[f64; 2]> },
    /// Click with the text tool, answering the prompt with `text`.
    Text { x: f64, y: f64, text: String },
    Clear,
    Resize { width: u32, height: u32 },
    Undo,
    Redo,
    Zoom { delta: f64 },
    Save { name: Option<String> },
    /// Load the gallery entry at `index`, newest first.
    Load { index: usize },
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub actions: Vec<Action>,
}

impl Script {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let actions: Vec<Action> = serde_json::from_str(data).context("invalid script JSON")?;
        Ok(Script { actions })
    }
}

/// Answers text prompts from a queue and logs notifications.
#[derive(Debug, Default, Clone)]
pub struct ScriptEffects {
    answers: Rc<RefCell<VecDeque<String>>>,
    notices: Rc<RefCell<Vec<String>>>,
}

impl ScriptEffects {
    pub fn push_answer(&self, text: &str) {
        self.answers.borrow_mut().push_back(text.to_string());
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.borrow().clone()
    }
}

impl Effects for ScriptEffects {
    fn prompt_text(&mut self, _default: &str) -> Option<String> {
        self.answers.borrow_mut().pop_front()
    }

    fn notify(&mut self, message: &str) {
        tracing::info!("{}", message);
        self.notices.borrow_mut().push(message.to_string());
    }
}

pub struct Player {
    pub session: DrawingSession,
    pub gallery: Gallery,
    effects: ScriptEffects,
}

impl Player {
    pub fn new(session: DrawingSession, gallery: Gallery) -> Self {
        let effects = ScriptEffects::default();
        let session = session.with_effects(Box::new(effects.clone()));
        Self { session, gallery, effects }
    }

    pub fn notices(&self) -> Vec<String> {
        self.effects.notices()
    }

    pub fn run(&mut self, script: &Script) -> Result<()> {
        for (index, action) in script.actions.iter().enumerate() {
            self.execute_action(action)
                .with_context(|| format!("action #{} ({:?}) failed", index, action))?;
        }
        Ok(())
    }

    pub fn execute_action(&mut self, action: &Action) -> Result<()> {
        let session = &mut self.session;
        match action {
            Action::Tool { tool } => session.set_tool(*tool),
            Action::Color { color } => session.set_color(Color::from_hex(color)?),
            Action::BrushWidth { width } => session.set_brush_width(*width),
            Action::Opacity { opacity } => session.set_opacity(*opacity),
            Action::Mirror { enabled } => session.set_mirror(*enabled),
            Action::Stamp { stamp } => session.select_stamp(*stamp),
            Action::Down { x, y } => session.pointer_down(Point::new(*x, *y))?,
            Action::Move { x, y } => session.pointer_move(Point::new(*x, *y)),
            Action::Up => session.pointer_up()?,
            Action::Leave => session.pointer_leave()?,
            Action::Stroke { points } => {
                let Some((first, rest)) = points.split_first() else {
                    bail!("stroke needs at least one point");
                };
                session.pointer_down(Point::new(first[0], first[1]))?;
                for p in rest {
                    session.pointer_move(Point::new(p[0], p[1]));
                }
                session.pointer_up()?;
            }
            Action::Text { x, y, text } => {
                self.effects.push_answer(text);
                session.set_tool(Tool::Text);
                session.pointer_down(Point::new(*x, *y))?;
            }
            Action::Clear => session.clear()?,
            Action::Resize { width, height } => session.resize(*width, *height)?,
            Action::Undo => {
                session.undo_now()?;
            }
            Action::Redo => {
                session.redo_now()?;
            }
            Action::Zoom { delta } => {
                session.zoom(*delta);
            }
            Action::Save { name } => {
                let drawing = session.saved_drawing(name.as_deref(), Utc::now())?;
                let outcome = self.gallery.save(drawing)?;
                session.notify(outcome.message());
            }
            Action::Load { index } => {
                let drawings = self.gallery.newest_first();
                let Some(drawing) = drawings.get(*index) else {
                    bail!("no saved drawing at index {} ({} saved)", index, drawings.len());
                };
                session.load_drawing(drawing)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_actions() {
        let script = Script::from_json(
            r##"[
                {"op": "tool", "tool": "fill"},
                {"op": "color", "color": "#00ff00"},
                {"op": "down", "x": 1, "y": 2.5},
                {"op": "stroke", "points": [[0, 0], [3, 4]]},
                {"op": "stamp", "stamp": "heart"},
                {"op": "save", "name": null},
                {"op": "undo"}
            ]"##,
        )
        .unwrap();

        assert_eq!(script.actions.len(), 7);
        assert_eq!(script.actions[0], Action::Tool { tool: Tool::Fill });
        assert_eq!(script.actions[2], Action::Down { x: 1.0, y: 2.5 });
        assert_eq!(script.actions[4], Action::Stamp { stamp: StampKind::Heart });
        assert_eq!(script.actions[6], Action::Undo);
    }

    #[test]
    fn rejects_unknown_ops() {
        assert!(Script::from_json(r#"[{"op": "teleport"}]"#).is_err());
    }

    #[test]
    fn effects_answer_prompts_in_order() {
        let effects = ScriptEffects::default();
        effects.push_answer("one");
        effects.push_answer("two");
        let mut handle = effects.clone();
        assert_eq!(handle.prompt_text("x").as_deref(), Some("one"));
        assert_eq!(handle.prompt_text("x").as_deref(), Some("two"));
        assert_eq!(handle.prompt_text("x"), None);

        handle.notify("hello");
        assert_eq!(effects.notices(), ["hello"]);
    }
}
