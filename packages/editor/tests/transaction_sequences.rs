//! Undo/redo sequences across complex transaction chains
//!
//! This covers:
//! - Multi-step edit chains with full undo/redo
//! - Batched gestures undoing as one step
//! - Block restoration after drags and straddling edits
//! - Document integrity after every step

use blockdoc_editor::{EditSession, PropertyBlock, Range};

fn session_with_speed() -> (EditSession, uuid::Uuid) {
    let catalog = vec![PropertyBlock::number("speed", 60.0)];
    let mut session = EditSession::with_properties(catalog.clone());
    session.insert_text("+1").unwrap();
    session.set_caret(0).unwrap();
    let id = session.insert_property_block(&catalog[0]).unwrap();
    (session, id)
}

#[test]
fn test_undo_redo_chain_over_typing() {
    let mut session = EditSession::new();
    for chunk in ["1", " + 2", " + 3"] {
        session.insert_text(chunk).unwrap();
    }
    assert_eq!(session.text(), "1 + 2 + 3");

    assert!(session.undo().unwrap());
    assert_eq!(session.text(), "1 + 2");
    assert!(session.undo().unwrap());
    assert_eq!(session.text(), "1");
    assert!(session.undo().unwrap());
    assert_eq!(session.text(), "");
    assert!(!session.undo().unwrap());

    assert!(session.redo().unwrap());
    assert!(session.redo().unwrap());
    assert!(session.redo().unwrap());
    assert_eq!(session.text(), "1 + 2 + 3");
    assert!(!session.redo().unwrap());
}

#[test]
fn test_new_edit_clears_redo() {
    let mut session = EditSession::new();
    session.insert_text("a").unwrap();
    session.insert_text("b").unwrap();
    session.undo().unwrap();
    assert!(session.engine().can_redo());

    session.insert_text("c").unwrap();
    assert_eq!(session.text(), "ac");
    assert!(!session.engine().can_redo());
}

#[test]
fn test_batched_gesture_undoes_as_one_step() {
    let mut session = EditSession::new();
    session.insert_text("base ").unwrap();

    session.begin_batch();
    session.insert_text("one ").unwrap();
    session.insert_text("two").unwrap();
    session.end_batch();
    assert_eq!(session.text(), "base one two");

    assert!(session.undo().unwrap());
    assert_eq!(session.text(), "base ");

    assert!(session.redo().unwrap());
    assert_eq!(session.text(), "base one two");
}

#[test]
fn test_undo_restores_block_after_insert() {
    let (mut session, id) = session_with_speed();
    assert_eq!(session.text(), "speed +1");

    // undo the block insertion: text and tracking both revert
    assert!(session.undo().unwrap());
    assert_eq!(session.text(), "+1");
    assert!(session.engine().ranges().is_empty());

    // redo brings the chip back at the same range
    assert!(session.redo().unwrap());
    assert_eq!(session.text(), "speed +1");
    let entry = session.engine().ranges().find(id).unwrap();
    assert_eq!(entry.range, Range::new(0, 5));
}

#[test]
fn test_drag_relocation_is_one_undo_step() {
    let (mut session, id) = session_with_speed();
    session.select_block(id).unwrap();
    let (channel, data) = session.encode_selected_block().unwrap();

    // drop at the end of the document
    let version = session.drop_payload(&channel, &data, 8).unwrap();
    assert!(version.is_some());
    assert_eq!(session.text(), " +1 speed");
    let entry = session.engine().ranges().find(id).unwrap();
    assert_eq!(entry.range, Range::new(4, 9));

    // one undo reverts both changes and both effects
    assert!(session.undo().unwrap());
    assert_eq!(session.text(), "speed +1");
    let entry = session.engine().ranges().find(id).unwrap();
    assert_eq!(entry.range, Range::new(0, 5));

    assert!(session.redo().unwrap());
    assert_eq!(session.text(), " +1 speed");
    assert_eq!(
        session.engine().ranges().find(id).unwrap().range,
        Range::new(4, 9)
    );
}

#[test]
fn test_expression_membership_edits_undo_cleanly() {
    let mut session = EditSession::new();
    let id = session.insert_expression_block("Avg()").unwrap();
    session
        .add_property_to_expression(id, &PropertyBlock::number("a", 2.0))
        .unwrap();
    session
        .add_property_to_expression(id, &PropertyBlock::number("b", 4.0))
        .unwrap();
    assert_eq!(session.text(), "Avg(a, b)");
    assert_eq!(session.simulate_expression(), Ok(3.0));

    // undo the second membership edit
    assert!(session.undo().unwrap());
    assert_eq!(session.text(), "Avg(a)");
    let entry = session.engine().ranges().find(id).unwrap();
    assert_eq!(entry.block.as_expression().unwrap().state().property_count, 1);

    // and the first
    assert!(session.undo().unwrap());
    assert_eq!(session.text(), "Avg()");
    assert!(!session
        .engine()
        .ranges()
        .find(id)
        .unwrap()
        .block
        .as_expression()
        .unwrap()
        .is_valid());
}

#[test]
fn test_interleaved_text_and_block_edits_keep_ranges_consistent() {
    let (mut session, id) = session_with_speed();

    // type after the block: range untouched
    session.set_caret(8).unwrap();
    session.insert_text(" * 2").unwrap();
    assert_eq!(session.text(), "speed +1 * 2");
    assert_eq!(
        session.engine().ranges().find(id).unwrap().range,
        Range::new(0, 5)
    );

    // type before the block: range shifts
    session.set_caret(0).unwrap();
    session.insert_text("0 + ").unwrap();
    assert_eq!(session.text(), "0 + speed +1 * 2");
    assert_eq!(
        session.engine().ranges().find(id).unwrap().range,
        Range::new(4, 9)
    );

    assert_eq!(session.simulate_expression(), Ok(62.0));

    // unwind everything
    while session.undo().unwrap() {}
    assert_eq!(session.text(), "");
    assert!(session.engine().ranges().is_empty());
}
