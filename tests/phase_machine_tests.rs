//! Phase table shape and transition rules

mod common;

use xstore_backup_operator::control::BackupContext;
use xstore_backup_operator::crd::{XStoreBackupPhase, XStoreBackupStatus};
use xstore_backup_operator::error::Error;
use xstore_backup_operator::reconcilers::xstore_backup::{
    build_task, cleanup_task, next_phase, steps_for,
};

use common::{new_backup, pass, test_config, FakeControlPlane};

fn transition_name(phase: XStoreBackupPhase) -> String {
    format!("TransitionTo{}", phase)
}

#[test]
fn every_phase_but_finished_ends_with_its_transition() {
    for phase in XStoreBackupPhase::ALL {
        let steps = steps_for(phase).expect("known phase has steps");
        let last = steps.last().expect("phase has at least one step").name();

        match next_phase(phase) {
            Some(next) => {
                assert!(next > phase, "{} must move forward", phase);
                assert_eq!(last, transition_name(next), "last step of {}", phase);
            }
            None => {
                assert_eq!(phase, XStoreBackupPhase::Finished);
                assert!(steps.iter().all(|s| !s.name().starts_with("TransitionTo")));
            }
        }
    }
}

#[test]
fn transitions_only_appear_last() {
    for phase in XStoreBackupPhase::ALL {
        let steps = steps_for(phase).unwrap();
        let transitions = steps
            .iter()
            .filter(|s| s.name().starts_with("TransitionTo"))
            .count();
        assert!(transitions <= 1, "{} has {} transitions", phase, transitions);
    }
}

#[test]
fn phase_steps_in_order() {
    assert_eq!(
        build_task(XStoreBackupPhase::New).step_names(),
        vec![
            "ValidateSpec",
            "UpdateBackupStartInfo",
            "CreateBackupConfigMap",
            "StartFullBackupJob",
            "TransitionToFullBackuping",
        ]
    );
    assert_eq!(
        build_task(XStoreBackupPhase::Collecting).step_names(),
        vec![
            "WaitBinlogOffsetCollected",
            "StartCollectBinlogJob",
            "WaitCollectBinlogJobFinished",
            "TransitionToBinlogBackuping",
        ]
    );
    assert_eq!(
        build_task(XStoreBackupPhase::BinlogBackuping).step_names(),
        vec![
            "WaitSeekCheckpointJobFinished",
            "StartBinlogBackupJob",
            "WaitBinlogBackupJobFinished",
            "ExtractLastEventTimestamp",
            "TransitionToBinlogWaiting",
        ]
    );
    assert_eq!(
        build_task(XStoreBackupPhase::Finished).step_names(),
        vec![
            "RemoveFullBackupJob",
            "RemoveCollectBinlogJob",
            "RemoveBinlogBackupJob",
            "RemoveBackupsOverRetention",
        ]
    );
}

#[test]
fn every_task_persists_status() {
    for phase in XStoreBackupPhase::ALL {
        let task = build_task(phase);
        assert_eq!(task.finalizer().map(|f| f.name()), Some("PersistStatusChanges"));
    }
    assert_eq!(
        cleanup_task().finalizer().map(|f| f.name()),
        Some("PersistStatusChanges")
    );
}

#[test]
fn unknown_phase_has_no_steps() {
    assert!(steps_for(XStoreBackupPhase::Unknown).is_none());
    assert!(next_phase(XStoreBackupPhase::Unknown).is_none());

    let task = build_task(XStoreBackupPhase::Unknown);
    assert!(task.is_empty());
    assert!(task.finalizer().is_some());
}

#[test]
fn unrecognized_phase_strings_parse_as_unknown() {
    let status: XStoreBackupStatus =
        serde_json::from_value(serde_json::json!({ "phase": "Restoring" })).unwrap();
    assert_eq!(status.phase, XStoreBackupPhase::Unknown);

    let status: XStoreBackupStatus =
        serde_json::from_value(serde_json::json!({ "phase": "" })).unwrap();
    assert_eq!(status.phase, XStoreBackupPhase::New);
}

#[tokio::test]
async fn unknown_phase_pass_changes_nothing() {
    let fake = FakeControlPlane::new();
    let mut backup = new_backup("b");
    backup.status = Some(XStoreBackupStatus {
        phase: XStoreBackupPhase::Unknown,
        ..Default::default()
    });
    fake.insert_backup(backup);

    let verdict = pass(&fake, "b").await;

    assert!(matches!(verdict, xstore_backup_operator::control::Verdict::Done));
    assert_eq!(fake.durable_phase("b"), XStoreBackupPhase::Unknown);
    assert_eq!(fake.status_patches(), 0);
    assert!(fake.job_names().is_empty());
}

#[test]
fn transitions_never_move_backwards() {
    let fake = FakeControlPlane::new();
    let mut backup = new_backup("b");
    backup.status = Some(XStoreBackupStatus {
        phase: XStoreBackupPhase::Collecting,
        ..Default::default()
    });
    fake.insert_backup(backup);
    let mut ctx = BackupContext::new(fake.backup("b").unwrap(), fake.clone(), test_config());

    assert!(matches!(
        ctx.transition_to(XStoreBackupPhase::FullBackuping),
        Err(Error::PhaseRegression { .. })
    ));
    assert!(matches!(
        ctx.transition_to(XStoreBackupPhase::Unknown),
        Err(Error::PhaseRegression { .. })
    ));
    assert_eq!(ctx.phase(), XStoreBackupPhase::Collecting);
    assert!(!ctx.requeue_requested());

    // Re-entering the current phase is a no-op
    assert!(ctx.transition_to(XStoreBackupPhase::Collecting).is_ok());
    assert!(!ctx.is_status_changed());

    assert!(ctx.transition_to(XStoreBackupPhase::BinlogBackuping).is_ok());
    assert!(ctx.requeue_requested());
}

#[test]
fn write_once_fields_reject_a_different_value() {
    let fake = FakeControlPlane::new();
    fake.insert_backup(new_backup("b"));
    let mut ctx = BackupContext::new(fake.backup("b").unwrap(), fake.clone(), test_config());

    assert!(ctx.set_secrets_snapshot_ref("b-accounts".to_string()).is_ok());
    assert!(ctx.set_secrets_snapshot_ref("b-accounts".to_string()).is_ok());
    assert!(matches!(
        ctx.set_secrets_snapshot_ref("other".to_string()),
        Err(Error::WriteOnce { .. })
    ));

    let ts = chrono::DateTime::from_timestamp(1_772_359_200, 0).unwrap();
    assert!(ctx.set_last_event_timestamp(ts).is_ok());
    assert!(ctx
        .set_last_event_timestamp(ts + chrono::Duration::seconds(1))
        .is_err());
    assert_eq!(ctx.status().last_event_timestamp, Some(ts));
}
