use rowedit_core::{field_value::FieldValue, settings::EditSettings};
use rowedit_engine::{
    CellPosition, DialogKind, EditAction, EditEvent, EditKey, EngineError, EventKind, FormTarget,
    InputEvent, SaveOptions, SessionMode,
};
use rowedit_harness::TestGrid;

fn draft_name(grid: &TestGrid) -> Option<FieldValue> {
    grid.controller.session().draft().and_then(|d| d.get("name")).cloned()
}

fn name_at(grid: &TestGrid, index: usize) -> Result<Option<FieldValue>, Box<dyn std::error::Error>> {
    Ok(grid.rows()?[index].record.get("name").cloned())
}

// ============================================================================
// Begin / save / cancel
// ============================================================================

#[test]
fn edit_then_save_commits_draft() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    let c = &mut grid.controller;

    assert!(c.begin_edit(Some(0))?);
    assert_eq!(c.session().mode(), SessionMode::Editing);
    assert_eq!(c.session().target_row_index(), Some(0));

    c.set_field("name", "X".into())?;
    assert!(c.save(SaveOptions::default())?);

    assert_eq!(c.session().mode(), SessionMode::Idle);
    assert!(c.session().original().is_none());
    assert!(c.session().draft().is_none());
    assert_eq!(name_at(&grid, 0)?, Some(FieldValue::from("X")));

    let Some(EditEvent::SaveComplete(done)) = grid.events.last(EventKind::SaveComplete) else {
        panic!("expected save-complete");
    };
    assert_eq!(done.action, EditAction::Edit);
    assert_eq!(done.data.get("name"), Some(&FieldValue::from("X")));
    assert_eq!(
        done.previous_data.as_ref().and_then(|r| r.get("name")),
        Some(&FieldValue::from("Ada"))
    );
    assert_eq!(done.row_index, 0);
    assert_eq!(grid.mutation_calls(), 1);
    Ok(())
}

#[test]
fn cancel_leaves_store_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    let before = grid.rows()?;

    grid.controller.begin_edit(Some(0))?;
    grid.controller.set_field("name", "X".into())?;
    grid.controller.set_field("age", 99.into())?;
    grid.controller.cancel(None)?;

    assert_eq!(grid.rows()?, before);
    assert_eq!(grid.mutation_calls(), 0);
    assert_eq!(grid.controller.session().mode(), SessionMode::Idle);

    let Some(EditEvent::Cancel(cancelled)) = grid.events.last(EventKind::Cancel) else {
        panic!("expected cancel event");
    };
    assert_eq!(cancelled.row_index, Some(0));
    assert_eq!(cancelled.data.get("name"), Some(&FieldValue::from("X")));
    Ok(())
}

#[test]
fn repeated_edit_cancel_cycles_never_write() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    let before = grid.rows()?;

    for row in [0, 1, 2, 1, 0] {
        grid.controller.begin_edit(Some(row))?;
        grid.controller.set_field("name", format!("draft {row}").into())?;
        grid.controller.cancel(None)?;
    }

    assert_eq!(grid.rows()?, before);
    assert_eq!(grid.mutation_calls(), 0);
    Ok(())
}

#[test]
fn begin_edit_same_row_twice_is_a_noop() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    assert!(grid.controller.begin_edit(Some(1))?);
    grid.controller.set_field("name", "Hopper".into())?;
    assert!(grid.controller.begin_edit(Some(1))?);

    assert_eq!(grid.events.count(EventKind::RowEditBegin), 1);
    assert_eq!(
        grid.controller.session().draft().and_then(|d| d.get("name")),
        Some(&FieldValue::from("Hopper"))
    );
    Ok(())
}

#[test]
fn update_row_commits_without_a_session() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    let mut record = grid.rows()?[2].record.clone();
    record.insert("name", "Torvalds".into());

    assert!(grid.controller.update_row(2, record)?);
    assert_eq!(name_at(&grid, 2)?, Some(FieldValue::from("Torvalds")));
    assert_eq!(grid.controller.session().mode(), SessionMode::Idle);
    let spare = grid.rows()?[0].record.clone();
    assert!(matches!(
        grid.controller.update_row(7, spare),
        Err(EngineError::RowOutOfRange { index: 7, len: 3 })
    ));
    Ok(())
}

#[test]
fn update_row_refuses_a_row_with_an_open_draft() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    let mut record = grid.rows()?[0].record.clone();
    record.insert("name", "Updated".into());
    record.insert("age", 99.into());

    grid.controller.begin_edit(Some(0))?;
    assert!(!grid.controller.update_row(0, record.clone())?);
    assert_eq!(grid.mutation_calls(), 0);

    grid.controller.set_field("age", 40.into())?;
    assert!(grid.controller.save(SaveOptions::default())?);
    let row = &grid.rows()?[0];
    assert_eq!(row.record.get("name"), Some(&FieldValue::from("Ada")));
    assert_eq!(row.record.get("age"), Some(&FieldValue::from(40)));

    let overlay = grid.controller.begin_overlay_edit(0)?.ok_or("overlay refused")?;
    assert!(!grid.controller.update_row(0, record.clone())?);

    grid.controller.cancel(Some(FormTarget::Overlay(overlay)))?;
    assert!(!grid.controller.overlays().contains(overlay));
    assert!(grid.controller.update_row(0, record)?);
    assert_eq!(name_at(&grid, 0)?, Some(FieldValue::from("Updated")));
    Ok(())
}

// ============================================================================
// Target resolution
// ============================================================================

#[test]
fn begin_edit_without_target_alerts_once() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();

    assert!(!grid.controller.begin_edit(None)?);

    let requests = grid.dialog.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, DialogKind::Alert);
    assert_eq!(requests[0].message, "No records selected for edit operation");
    assert_eq!(grid.controller.session().mode(), SessionMode::Idle);
    Ok(())
}

#[test]
fn begin_edit_falls_back_to_first_selected_row() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.selection.select(&[2, 0]);

    assert!(grid.controller.begin_edit(None)?);
    assert_eq!(grid.controller.session().target_row_index(), Some(2));
    assert_eq!(grid.dialog.prompt_count(), 0);
    Ok(())
}

#[test]
fn begin_edit_out_of_range_alerts() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    assert!(!grid.controller.begin_edit(Some(10))?);
    assert_eq!(grid.dialog.prompt_count(), 1);
    Ok(())
}

#[test]
fn editing_disabled_is_silent() -> Result<(), Box<dyn std::error::Error>> {
    let settings = EditSettings {
        allow_editing: false,
        ..EditSettings::default()
    };
    let mut grid = TestGrid::with_settings(settings);

    assert!(!grid.controller.begin_edit(Some(0))?);
    assert_eq!(grid.dialog.prompt_count(), 0);
    assert!(grid.events.events().is_empty());
    Ok(())
}

// ============================================================================
// Switching rows
// ============================================================================

#[test]
fn switching_rows_commits_the_open_edit() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(0))?;
    grid.controller.set_field("name", "Ada L".into())?;

    assert!(grid.controller.begin_edit(Some(1))?);

    assert_eq!(name_at(&grid, 0)?, Some(FieldValue::from("Ada L")));
    assert_eq!(grid.controller.session().target_row_index(), Some(1));
    assert_eq!(grid.events.count(EventKind::SaveComplete), 1);
    Ok(())
}

#[test]
fn invalid_draft_blocks_switching_rows() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(0))?;
    let uid = grid.controller.session().target_uid();
    grid.controller.set_field("name", "".into())?;

    assert!(!grid.controller.begin_edit(Some(1))?);

    let session = grid.controller.session();
    assert_eq!(session.mode(), SessionMode::Editing);
    assert_eq!(session.target_uid(), uid);
    assert!(session.validation_errors().is_some_and(|e| e.contains("name")));
    assert_eq!(grid.mutation_calls(), 0);
    Ok(())
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn validation_failure_keeps_session_open() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(1))?;
    grid.controller.set_field("name", "".into())?;
    grid.controller.set_field("age", 200.into())?;

    assert!(!grid.controller.save(SaveOptions::default())?);

    let session = grid.controller.session();
    assert_eq!(session.mode(), SessionMode::Editing);
    let errors = session.validation_errors().ok_or("no errors recorded")?;
    assert!(errors.contains("name"));
    assert!(errors.contains("age"));
    assert!(!errors.contains("id"));
    assert_eq!(grid.mutation_calls(), 0);
    assert_eq!(grid.events.count(EventKind::SaveBegin), 0);

    grid.controller.set_field("name", "Bo".into())?;
    grid.controller.set_field("age", 50.into())?;
    assert!(grid.controller.save(SaveOptions::default())?);
    assert_eq!(name_at(&grid, 1)?, Some(FieldValue::from("Bo")));
    Ok(())
}

#[test]
fn save_without_validation_skips_rules() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(1))?;
    grid.controller.set_field("name", "".into())?;

    assert!(grid.controller.save(SaveOptions::default().without_validation())?);
    assert_eq!(name_at(&grid, 1)?, Some(FieldValue::from("")));
    Ok(())
}

#[test]
fn blur_validates_only_that_field() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(0))?;

    grid.controller.handle_input(InputEvent::Changed {
        target: None,
        field: "name".into(),
        value: "".into(),
    })?;
    grid.controller.handle_input(InputEvent::Changed {
        target: None,
        field: "email".into(),
        value: "not-an-email".into(),
    })?;
    grid.controller.handle_input(InputEvent::Blurred {
        target: None,
        field: "email".into(),
    })?;

    let errors = grid.controller.session().validation_errors().ok_or("no form")?;
    assert!(errors.contains("email"));
    assert!(!errors.contains("name"));

    grid.controller.handle_input(InputEvent::Changed {
        target: None,
        field: "email".into(),
        value: "ada@example.com".into(),
    })?;
    assert!(grid.controller.validate_field("email")?);
    let errors = grid.controller.session().validation_errors().ok_or("no form")?;
    assert!(errors.is_empty());
    Ok(())
}

#[test]
fn validate_form_rejects_stale_handle() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(0))?;
    let stale = grid.controller.session().primary_form().ok_or("no form")?.form.clone();
    grid.controller.cancel(None)?;
    grid.controller.begin_edit(Some(0))?;

    assert!(matches!(
        grid.controller.validate_form(&stale),
        Err(EngineError::FormClosed(_))
    ));

    let current = grid.controller.session().primary_form().ok_or("no form")?.form.clone();
    grid.controller.set_field("email", "nope".into())?;
    let errors = grid.controller.validate_form(&current)?;
    assert_eq!(errors.len(), 1);
    assert!(errors.contains("email"));
    Ok(())
}

#[test]
fn primary_key_is_locked_on_existing_rows() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(0))?;

    assert!(matches!(
        grid.controller.set_field("id", 9.into()),
        Err(EngineError::ColumnNotEditable(_))
    ));
    assert!(matches!(
        grid.controller.set_field_on(FormTarget::StandingAdd, "name", "x".into()),
        Err(EngineError::NoActiveSession)
    ));
    Ok(())
}

#[test]
fn set_field_without_session_errors() {
    let mut grid = TestGrid::new();
    assert!(matches!(
        grid.controller.set_field("name", "x".into()),
        Err(EngineError::NoActiveSession)
    ));
}

// ============================================================================
// Drafts
// ============================================================================

#[test]
fn undo_and_redo_walk_field_changes() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(0))?;
    grid.controller.set_field("name", "X".into())?;
    grid.controller.set_field("name", "Y".into())?;

    assert!(grid.controller.undo_field_change(None)?);
    assert_eq!(draft_name(&grid), Some(FieldValue::from("X")));
    assert!(grid.controller.undo_field_change(None)?);
    assert_eq!(draft_name(&grid), Some(FieldValue::from("Ada")));
    assert!(!grid.controller.undo_field_change(None)?);

    assert!(grid.controller.redo_field_change(None)?);
    assert_eq!(draft_name(&grid), Some(FieldValue::from("X")));

    // A fresh change drops the redo branch.
    grid.controller.set_field("name", "Z".into())?;
    assert!(!grid.controller.redo_field_change(None)?);
    Ok(())
}

#[test]
fn nested_paths_write_into_objects() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(2))?;
    grid.controller.set_field("address.city", "Helsinki".into())?;
    assert!(grid.controller.save(SaveOptions::default())?);

    let row = &grid.rows()?[2];
    assert_eq!(row.record.lookup("address.city"), Some(&FieldValue::from("Helsinki")));
    Ok(())
}

#[test]
fn original_snapshot_survives_draft_changes() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(0))?;
    grid.controller.set_field("name", "X".into())?;

    let session = grid.controller.session();
    assert_eq!(
        session.original().and_then(|r| r.get("name")),
        Some(&FieldValue::from("Ada"))
    );
    assert_eq!(session.draft().and_then(|r| r.get("name")), Some(&FieldValue::from("X")));
    Ok(())
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn cancelled_row_edit_begin_opens_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.subscribe(|event| {
        if event.kind() == EventKind::RowEditBegin {
            event.cancel();
        }
    });

    assert!(!grid.controller.begin_edit(Some(0))?);
    grid.controller.run_deferred()?;

    assert_eq!(grid.controller.session().mode(), SessionMode::Idle);
    assert_eq!(grid.events.count(EventKind::FormRendered), 0);
    Ok(())
}

#[test]
fn cancelled_save_begin_keeps_session() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.subscribe(|event| {
        if let EditEvent::SaveBegin(args) = event {
            args.cancel = args.data.get("name") == Some(&FieldValue::from("blocked"));
        }
    });
    grid.controller.begin_edit(Some(0))?;
    grid.controller.set_field("name", "blocked".into())?;

    assert!(!grid.controller.save(SaveOptions::default())?);
    assert_eq!(grid.controller.session().mode(), SessionMode::Editing);
    assert_eq!(grid.mutation_calls(), 0);

    grid.controller.set_field("name", "allowed".into())?;
    assert!(grid.controller.save(SaveOptions::default())?);
    Ok(())
}

#[test]
fn form_rendered_fires_after_the_turn() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(1))?;
    assert_eq!(grid.events.count(EventKind::FormRendered), 0);

    grid.controller.run_deferred()?;

    let Some(EditEvent::FormRendered(rendered)) = grid.events.last(EventKind::FormRendered) else {
        panic!("expected form-rendered");
    };
    assert_eq!(rendered.row_index, Some(1));
    assert_eq!(rendered.form.target, FormTarget::Primary);
    assert_eq!(rendered.data.get("name"), Some(&FieldValue::from("Grace")));
    Ok(())
}

#[test]
fn form_rendered_is_dropped_for_closed_forms() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(1))?;
    grid.controller.cancel(None)?;
    grid.controller.run_deferred()?;

    assert_eq!(grid.events.count(EventKind::FormRendered), 0);
    assert_eq!(grid.controller.pending_deferred(), 0);
    Ok(())
}

#[test]
fn event_order_for_an_edit() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(0))?;
    grid.controller.run_deferred()?;
    grid.controller.set_field("name", "Lovelace".into())?;
    grid.controller.save(SaveOptions::default())?;

    assert_eq!(
        grid.events.kinds(),
        vec![
            EventKind::RowEditBegin,
            EventKind::FormRendered,
            EventKind::SaveBegin,
            EventKind::SaveComplete,
        ]
    );
    Ok(())
}

// ============================================================================
// Gateway failures
// ============================================================================

#[test]
fn failed_commit_keeps_session_for_retry() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.controller.begin_edit(Some(0))?;
    grid.controller.set_field("name", "X".into())?;
    grid.controller.gateway_mut().fail_with("offline");

    assert!(!grid.controller.save(SaveOptions::default())?);

    assert_eq!(grid.events.count(EventKind::MutationError), 1);
    let Some(EditEvent::MutationError(failure)) = grid.events.last(EventKind::MutationError) else {
        panic!("expected mutation-error");
    };
    assert_eq!(failure.action, EditAction::Edit);
    assert!(failure.message.contains("offline"));
    assert_eq!(grid.events.count(EventKind::SaveComplete), 0);
    assert_eq!(grid.controller.session().mode(), SessionMode::Editing);
    assert_eq!(name_at(&grid, 0)?, Some(FieldValue::from("Ada")));

    grid.controller.gateway_mut().recover();
    assert!(grid.controller.save(SaveOptions::default())?);
    assert_eq!(name_at(&grid, 0)?, Some(FieldValue::from("X")));
    Ok(())
}

// ============================================================================
// Focus and shortcuts
// ============================================================================

#[test]
fn save_restores_focus_to_committed_row() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.focus.focus_cell(1, 2);

    assert!(grid.controller.handle_key(EditKey::F2)?);
    assert_eq!(grid.controller.session().target_row_index(), Some(1));
    grid.controller.set_field("name", "Grace H".into())?;
    assert!(grid.controller.handle_key(EditKey::Enter)?);
    grid.controller.run_deferred()?;

    assert!(grid.focus.has_focus());
    assert_eq!(grid.focus.last_navigation(), Some(CellPosition::new(1, 2)));
    assert_eq!(grid.selection.selected(), vec![1]);
    Ok(())
}

#[test]
fn escape_cancels_and_restores_focus() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    grid.focus.focus_cell(2, 1);
    grid.controller.handle_key(EditKey::F2)?;

    assert!(grid.controller.handle_key(EditKey::Escape)?);
    assert!(!grid.controller.handle_key(EditKey::Escape)?);
    grid.controller.run_deferred()?;

    assert_eq!(grid.controller.session().mode(), SessionMode::Idle);
    assert_eq!(grid.focus.last_navigation(), Some(CellPosition::new(2, 1)));
    Ok(())
}

#[test]
fn double_click_respects_setting() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = TestGrid::new();
    assert!(grid.controller.handle_double_click(2)?);
    assert_eq!(grid.controller.session().target_row_index(), Some(2));

    let settings = EditSettings {
        allow_edit_on_dbl_click: false,
        ..EditSettings::default()
    };
    let mut grid = TestGrid::with_settings(settings);
    assert!(!grid.controller.handle_double_click(2)?);
    assert_eq!(grid.controller.session().mode(), SessionMode::Idle);
    Ok(())
}
