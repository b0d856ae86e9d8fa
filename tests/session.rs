use drawing_pad::config::Config;
use drawing_pad::history::{History, Snapshot};
use drawing_pad::renderer::Point;
use drawing_pad::session::RestoreOutcome;
use drawing_pad::{Color, DrawError, DrawingSession, Effects, Tool};
use image::RgbaImage;
use std::cell::RefCell;
use std::rc::Rc;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn session(width: u32, height: u32) -> DrawingSession {
    let mut config = Config::default();
    config.canvas.width = width;
    config.canvas.height = height;
    DrawingSession::with_bitmap_font(&config).unwrap()
}

fn fill_at(s: &mut DrawingSession, x: f64, y: f64, color: Color) {
    s.set_tool(Tool::Fill);
    s.set_color(color);
    s.pointer_down(Point::new(x, y)).unwrap();
}

fn stroke(s: &mut DrawingSession, points: &[(f64, f64)]) {
    let (first, rest) = points.split_first().unwrap();
    s.pointer_down(Point::new(first.0, first.1)).unwrap();
    for &(x, y) in rest {
        s.pointer_move(Point::new(x, y));
    }
    s.pointer_up().unwrap();
}

fn rgba(s: &DrawingSession, x: u32, y: u32) -> [u8; 4] {
    s.surface().get_pixel(x, y).0
}

#[derive(Default, Clone)]
struct Recorder {
    answer: Option<String>,
    prompts: Rc<RefCell<Vec<String>>>,
    notices: Rc<RefCell<Vec<String>>>,
    flags: Rc<RefCell<Vec<(bool, bool)>>>,
}

impl Effects for Recorder {
    fn prompt_text(&mut self, default: &str) -> Option<String> {
        self.prompts.borrow_mut().push(default.to_string());
        self.answer.clone()
    }

    fn notify(&mut self, message: &str) {
        self.notices.borrow_mut().push(message.to_string());
    }

    fn history_changed(&mut self, can_undo: bool, can_redo: bool) {
        self.flags.borrow_mut().push((can_undo, can_redo));
    }
}

#[test]
fn brush_gesture_records_once_on_release() {
    let mut s = session(20, 10);
    s.pointer_down(Point::new(2.0, 2.0)).unwrap();
    s.pointer_move(Point::new(5.0, 2.0));
    s.pointer_move(Point::new(8.0, 2.0));

    // Still in the overlay
    assert_eq!(rgba(&s, 5, 2), WHITE);
    assert_eq!(s.history().len(), 1);

    s.pointer_up().unwrap();
    assert_eq!(rgba(&s, 5, 2), BLACK);
    assert_eq!(rgba(&s, 15, 2), WHITE);
    assert_eq!(s.history().len(), 2);
    assert!(s.can_undo());
    assert!(!s.is_drawing());
}

#[test]
fn a_tap_leaves_a_dab() {
    let mut s = session(20, 10);
    stroke(&mut s, &[(10.0, 5.0)]);
    assert_eq!(rgba(&s, 10, 5), BLACK);
    assert_eq!(s.history().len(), 2);
}

#[test]
fn mirror_reflects_across_the_vertical_center() {
    let mut s = session(20, 10);
    s.set_mirror(true);
    stroke(&mut s, &[(2.0, 2.0), (5.0, 2.0)]);

    assert_eq!(rgba(&s, 3, 2), BLACK);
    assert_eq!(rgba(&s, 16, 2), BLACK);
    assert_eq!(rgba(&s, 10, 8), WHITE);
    assert_eq!(s.history().len(), 2);
}

#[test]
fn eraser_paints_white() {
    let mut s = session(20, 10);
    fill_at(&mut s, 0.0, 0.0, Color::rgb(0, 0, 255));
    s.set_tool(Tool::Eraser);
    stroke(&mut s, &[(10.0, 5.0)]);
    assert_eq!(rgba(&s, 10, 5), WHITE);
    assert_eq!(rgba(&s, 0, 0), [0, 0, 255, 255]);
}

#[test]
fn shape_preview_only_keeps_the_final_rectangle() {
    let mut s = session(20, 10);
    s.set_tool(Tool::Shape);
    stroke(&mut s, &[(2.0, 2.0), (8.0, 6.0), (12.0, 8.0)]);

    assert_eq!(rgba(&s, 12, 5), BLACK);
    assert_eq!(rgba(&s, 2, 5), BLACK);
    // Interior and the abandoned preview edge stay untouched
    assert_eq!(rgba(&s, 7, 5), WHITE);
    assert_eq!(rgba(&s, 8, 5), WHITE);
    assert_eq!(s.history().len(), 2);
}

#[test]
fn leaving_the_surface_commits_the_gesture() {
    let mut s = session(20, 10);
    s.pointer_down(Point::new(2.0, 5.0)).unwrap();
    s.pointer_move(Point::new(6.0, 5.0));
    s.pointer_leave().unwrap();

    assert_eq!(rgba(&s, 4, 5), BLACK);
    assert_eq!(s.history().len(), 2);

    // Moves after the gesture ended draw nothing
    s.pointer_move(Point::new(15.0, 5.0));
    s.pointer_up().unwrap();
    assert_eq!(rgba(&s, 15, 5), WHITE);
    assert_eq!(s.history().len(), 2);
}

#[test]
fn fill_through_the_session() {
    let red = Color::rgb(255, 0, 0);
    let mut s = session(10, 10);
    fill_at(&mut s, 5.5, 5.5, red);
    assert!(s.surface().pixels().all(|p| p.0 == [255, 0, 0, 255]));
    assert_eq!(s.history().len(), 2);

    // Same color again writes nothing and records nothing
    fill_at(&mut s, 1.0, 1.0, red);
    assert_eq!(s.history().len(), 2);

    // Outside the surface
    fill_at(&mut s, -3.0, 4.0, Color::rgb(0, 255, 0));
    assert_eq!(s.history().len(), 2);
}

#[test]
fn fill_stops_at_a_painted_line() {
    let mut s = session(10, 10);
    s.set_brush_width(1);
    stroke(&mut s, &[(5.0, 0.0), (5.0, 9.0)]);
    fill_at(&mut s, 2.0, 2.0, Color::rgb(255, 0, 0));

    assert_eq!(rgba(&s, 0, 9), [255, 0, 0, 255]);
    assert_eq!(rgba(&s, 5, 4), BLACK);
    assert_eq!(rgba(&s, 7, 4), WHITE);
}

#[test]
fn undo_and_redo_round_trip() {
    let mut s = session(20, 10);
    let blank = s.surface().clone();
    stroke(&mut s, &[(2.0, 2.0), (8.0, 2.0)]);
    stroke(&mut s, &[(2.0, 7.0), (8.0, 7.0)]);
    fill_at(&mut s, 15.0, 5.0, Color::rgb(0, 128, 0));
    let finished = s.surface().clone();

    for _ in 0..3 {
        assert!(s.undo_now().unwrap());
    }
    assert_eq!(s.surface(), &blank);
    assert!(!s.undo_now().unwrap());

    for _ in 0..3 {
        assert!(s.redo_now().unwrap());
    }
    assert_eq!(s.surface(), &finished);
    assert!(!s.redo_now().unwrap());
    assert_eq!(s.history().len(), 4);
}

#[test]
fn editing_after_undo_discards_redo_entries() {
    let mut s = session(8, 8);
    for shade in 1..=5u8 {
        fill_at(&mut s, 0.0, 0.0, Color::rgb(shade, 0, 0));
    }
    assert_eq!(s.history().len(), 6);

    s.undo_now().unwrap();
    s.undo_now().unwrap();
    assert!(s.can_redo());
    assert_eq!(rgba(&s, 0, 0), [3, 0, 0, 255]);

    fill_at(&mut s, 0.0, 0.0, Color::rgb(9, 9, 9));
    assert_eq!(s.history().len(), 5);
    assert!(!s.can_redo());
    assert_eq!(s.history().cursor(), 4);
}

#[test]
fn history_is_capped_at_fifty() {
    let mut s = session(4, 4);
    // The starting surface is the first record, then fifty more
    for shade in 1..=50u8 {
        fill_at(&mut s, 0.0, 0.0, Color::rgb(shade, 0, 0));
    }
    assert_eq!(s.history().len(), 50);

    for _ in 0..49 {
        assert!(s.undo_now().unwrap());
    }
    assert!(!s.can_undo());
    assert_eq!(rgba(&s, 0, 0), [1, 0, 0, 255]);
}

#[test]
fn only_the_latest_restore_is_applied() {
    let mut s = session(8, 8);
    for shade in 1..=3u8 {
        fill_at(&mut s, 0.0, 0.0, Color::rgb(shade, 0, 0));
    }

    let first = s.undo().unwrap();
    let second = s.undo().unwrap();
    // Nothing changes until a request is finished
    assert_eq!(rgba(&s, 0, 0), [3, 0, 0, 255]);

    assert_eq!(s.finish_restore(first).unwrap(), RestoreOutcome::Stale);
    assert_eq!(rgba(&s, 0, 0), [3, 0, 0, 255]);

    let applied = s.finish_restore(second.clone()).unwrap();
    assert_eq!(applied, RestoreOutcome::Applied { index: 1 });
    assert_eq!(rgba(&s, 0, 0), [1, 0, 0, 255]);

    // Applying the same request twice is a no-op
    assert_eq!(s.finish_restore(second).unwrap(), RestoreOutcome::Stale);
}

#[test]
fn an_edit_settles_and_invalidates_pending_restores() {
    let mut s = session(8, 8);
    fill_at(&mut s, 0.0, 0.0, Color::rgb(1, 0, 0));
    fill_at(&mut s, 0.0, 0.0, Color::rgb(2, 0, 0));

    let request = s.undo().unwrap();
    s.clear().unwrap();
    assert_eq!(s.finish_restore(request).unwrap(), RestoreOutcome::Stale);
    assert_eq!(rgba(&s, 0, 0), WHITE);

    // The edit was recorded on top of the restored entry
    assert_eq!(s.history().len(), 3);
    s.undo_now().unwrap();
    assert_eq!(rgba(&s, 0, 0), [1, 0, 0, 255]);
}

#[test]
fn undo_during_a_stroke_lands_before_the_stroke_commits() {
    let mut s = session(20, 10);
    fill_at(&mut s, 0.0, 0.0, Color::rgb(1, 0, 0));
    fill_at(&mut s, 0.0, 0.0, Color::rgb(2, 0, 0));

    s.set_tool(Tool::Brush);
    s.pointer_down(Point::new(10.0, 5.0)).unwrap();
    let request = s.undo().unwrap();
    assert_eq!(request.index, 1);
    s.pointer_up().unwrap();

    assert_eq!(rgba(&s, 0, 0), [1, 0, 0, 255]);
    assert_eq!(rgba(&s, 10, 5), BLACK);
    assert_eq!(s.history().len(), 3);
    assert_eq!(s.history().cursor(), 2);
    assert_eq!(s.finish_restore(request).unwrap(), RestoreOutcome::Stale);

    // The stroke is undoable on its own
    s.undo_now().unwrap();
    assert_eq!(rgba(&s, 10, 5), [1, 0, 0, 255]);
}

#[test]
fn far_off_moves_are_clipped() {
    let mut s = session(20, 10);
    s.pointer_down(Point::new(1.0, 1.0)).unwrap();
    s.pointer_move(Point::new(1e300, 1.0));
    s.pointer_up().unwrap();

    assert_eq!(rgba(&s, 10, 1), BLACK);
    assert_eq!(rgba(&s, 19, 1), BLACK);
    assert_eq!(rgba(&s, 10, 8), WHITE);
    assert_eq!(s.history().len(), 2);
}

#[test]
fn non_finite_positions_are_rejected() {
    let mut s = session(20, 10);
    assert!(matches!(
        s.pointer_down(Point::new(f64::NAN, 1.0)),
        Err(DrawError::InvalidPoint { .. })
    ));
    assert!(!s.is_drawing());

    s.pointer_down(Point::new(2.0, 2.0)).unwrap();
    s.pointer_move(Point::new(f64::INFINITY, 2.0));
    s.pointer_move(Point::new(4.0, 2.0));
    s.pointer_up().unwrap();
    assert_eq!(rgba(&s, 4, 2), BLACK);
    assert_eq!(s.history().len(), 2);
}

#[test]
fn a_second_down_commits_the_first_gesture() {
    let mut s = session(20, 10);
    s.pointer_down(Point::new(2.0, 2.0)).unwrap();
    s.pointer_move(Point::new(6.0, 2.0));
    s.pointer_down(Point::new(14.0, 7.0)).unwrap();
    s.pointer_up().unwrap();

    assert_eq!(rgba(&s, 4, 2), BLACK);
    assert_eq!(rgba(&s, 14, 7), BLACK);
    assert_eq!(s.history().len(), 3);
}

#[test]
fn restore_jumps_to_any_entry() {
    let mut s = session(8, 8);
    for shade in 1..=4u8 {
        fill_at(&mut s, 0.0, 0.0, Color::rgb(shade, 0, 0));
    }
    let request = s.restore(2).unwrap();
    s.finish_restore(request).unwrap();
    assert_eq!(rgba(&s, 0, 0), [2, 0, 0, 255]);
    assert_eq!(s.history().len(), 5);
    assert!(s.can_redo());
    assert!(matches!(s.restore(9), Err(DrawError::MissingSnapshot(9))));
}

#[test]
fn corrupt_snapshot_tokens_fail_to_decode() {
    let mut history = History::new(50);
    let good = RgbaImage::from_pixel(2, 2, image::Rgba(WHITE));
    history.record(Snapshot::capture(&good).unwrap());
    history.record(Snapshot::from_token("data:image/png;base64,AAAA"));
    history.record(Snapshot::capture(&good).unwrap());

    let request = history.undo().unwrap();
    assert!(request.decode().is_err());
    assert_eq!(history.undo().unwrap().decode().unwrap(), good);
}

#[test]
fn clear_and_resize_are_recorded() {
    let recorder = Recorder::default();
    let mut s = session(20, 10).with_effects(Box::new(recorder.clone()));
    stroke(&mut s, &[(2.0, 2.0)]);
    s.clear().unwrap();
    assert!(s.surface().pixels().all(|p| p.0 == WHITE));
    assert_eq!(recorder.notices.borrow().as_slice(), ["Canvas cleared"]);

    s.resize(30, 12).unwrap();
    assert_eq!(s.surface().dimensions(), (30, 12));
    assert!(s.surface().pixels().all(|p| p.0[3] == 0));
    assert_eq!(s.history().len(), 4);
    assert!(matches!(s.resize(0, 12), Err(DrawError::InvalidSize { .. })));

    // Undoing across a resize brings the old size back
    s.undo_now().unwrap();
    assert_eq!(s.surface().dimensions(), (20, 10));
    assert_eq!(recorder.flags.borrow().last(), Some(&(true, true)));
}

#[test]
fn text_uses_the_prompt_answer() {
    let recorder = Recorder {
        answer: Some("HI".to_string()),
        ..Recorder::default()
    };
    let mut s = session(40, 20).with_effects(Box::new(recorder.clone()));
    s.set_tool(Tool::Text);
    s.pointer_down(Point::new(2.0, 15.0)).unwrap();

    assert_eq!(recorder.prompts.borrow().as_slice(), ["Hello World"]);
    assert!(s.surface().pixels().any(|p| p.0 == BLACK));
    assert_eq!(s.history().len(), 2);
}

#[test]
fn cancelled_text_prompt_changes_nothing() {
    let mut s = session(40, 20).with_effects(Box::new(Recorder::default()));
    s.set_tool(Tool::Text);
    s.pointer_down(Point::new(2.0, 15.0)).unwrap();
    assert!(s.surface().pixels().all(|p| p.0 == WHITE));
    assert_eq!(s.history().len(), 1);
}

#[test]
fn stamp_is_placed_on_click() {
    let mut s = session(60, 60);
    s.select_stamp(drawing_pad::StampKind::Heart);
    assert_eq!(s.tools().tool, Tool::Stamp);
    s.pointer_down(Point::new(30.0, 30.0)).unwrap();
    assert_ne!(rgba(&s, 30, 30), WHITE);
    assert_eq!(s.history().len(), 2);
}
