use super::*;
use crate::machines::{apply_edits, build_add_draft, format_row};
use vendmap_core::{Coordinates, MachineDraft, VendingMachineRecord};

fn record() -> VendingMachineRecord {
    VendingMachineRecord {
        id: 12,
        lat: 49.25,
        lon: -123.0,
        location: "SW1".to_string(),
        desc: "Snacks".to_string(),
        available: true,
        items: r#"[{"name":"Cola","available":true},{"name":"Gum","available":false},{"name":"Chips","available":true}]"#.to_string(),
        image_url: None,
        created_at: chrono::Utc::now(),
    }
}

#[test]
fn parses_migrate_command() {
    let cli = Cli::try_parse_from(["vendmap-cli", "migrate"]).expect("parse");
    assert!(matches!(cli.command, Some(Commands::Migrate)));
}

#[test]
fn no_command_is_allowed() {
    let cli = Cli::try_parse_from(["vendmap-cli"]).expect("parse");
    assert!(cli.command.is_none());
}

#[test]
fn global_server_flag_follows_subcommand() {
    let cli = Cli::try_parse_from([
        "vendmap-cli",
        "machines",
        "list",
        "--server",
        "http://api.example:8080",
    ])
    .expect("parse");
    assert_eq!(cli.server, "http://api.example:8080");
    assert!(matches!(
        cli.command,
        Some(Commands::Machines {
            command: MachineCommands::List
        })
    ));
}

#[test]
fn machines_group_defaults_tolerance() {
    let cli = Cli::try_parse_from(["vendmap-cli", "machines", "group", "5"]).expect("parse");
    match cli.command {
        Some(Commands::Machines {
            command: MachineCommands::Group { id, tolerance },
        }) => {
            assert_eq!(id, 5);
            assert!((tolerance - vendmap_core::DEFAULT_TOLERANCE_DEG).abs() < f64::EPSILON);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn machines_add_accepts_negative_longitude_and_repeated_items() {
    let cli = Cli::try_parse_from([
        "vendmap-cli",
        "machines",
        "add",
        "--lat",
        "49.25",
        "--lon",
        "-123.0",
        "--location",
        "SW1 lobby",
        "--desc",
        "Snacks",
        "--item",
        "Cola",
        "--item",
        "Chips",
    ])
    .expect("parse");
    match cli.command {
        Some(Commands::Machines {
            command:
                MachineCommands::Add {
                    lat,
                    lon,
                    items,
                    unavailable,
                    building,
                    ..
                },
        }) => {
            assert_eq!(lat, Some(49.25));
            assert_eq!(lon, Some(-123.0));
            assert_eq!(items, vec!["Cola".to_string(), "Chips".to_string()]);
            assert!(!unavailable);
            assert!(building.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn machines_add_rejects_building_with_coordinates() {
    let result = Cli::try_parse_from([
        "vendmap-cli",
        "machines",
        "add",
        "--building",
        "SW1",
        "--lat",
        "49.25",
        "--desc",
        "Snacks",
    ]);
    assert!(result.is_err());
}

#[test]
fn machines_edit_collects_operations() {
    let cli = Cli::try_parse_from([
        "vendmap-cli",
        "machines",
        "edit",
        "3",
        "--toggle",
        "0",
        "--remove",
        "1",
        "--add-item",
        "Water",
        "--available",
        "false",
    ])
    .expect("parse");
    match cli.command {
        Some(Commands::Machines {
            command:
                MachineCommands::Edit {
                    id,
                    add,
                    toggle,
                    remove,
                    available,
                },
        }) => {
            assert_eq!(id, 3);
            assert_eq!(add, vec!["Water".to_string()]);
            assert_eq!(toggle, vec![0]);
            assert_eq!(remove, vec![1]);
            assert_eq!(available, Some(false));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn login_requires_email() {
    let result = Cli::try_parse_from(["vendmap-cli", "login", "--password", "pw"]);
    assert!(result.is_err());
}

#[test]
fn add_draft_without_position_fails_on_submit() {
    let draft = build_add_draft(None, Some("SW1".into()), "Snacks", &[], true).expect("draft");
    assert!(draft.into_new_machine().is_err());
}

#[test]
fn add_draft_skips_blank_items() {
    let draft = build_add_draft(
        Some(Coordinates::new(49.25, -123.0)),
        Some("SW1".into()),
        "Snacks",
        &["Cola".to_string(), "   ".to_string()],
        false,
    )
    .expect("draft");
    let machine = draft.into_new_machine().expect("valid machine");
    assert_eq!(machine.items.len(), 1);
    assert_eq!(machine.items[0].name, "Cola");
    assert!(!machine.available);
}

#[test]
fn edits_remove_highest_index_first() {
    let mut draft = MachineDraft::from_record(&record());
    apply_edits(&mut draft, &[], &[], &[0, 2], None);
    let names: Vec<_> = draft.items().iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Gum"]);
}

#[test]
fn edits_toggle_before_add() {
    let mut draft = MachineDraft::from_record(&record());
    apply_edits(&mut draft, &["Water".to_string()], &[1], &[], Some(false));
    let update = draft.into_update();
    let items = update.items.expect("items present");
    assert_eq!(items.len(), 4);
    assert!(items[1].available);
    assert_eq!(items[3].name, "Water");
    assert_eq!(update.available, Some(false));
}

#[test]
fn row_shows_availability() {
    let row = format_row(&record());
    assert!(row.starts_with("12"));
    assert!(row.contains("yes"));
    assert!(row.contains("SW1"));
}
