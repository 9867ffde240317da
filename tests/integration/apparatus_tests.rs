//! Assembled apparatus: config → adapters → running components.

use std::fs;
use std::path::Path;

use edge_executor::LocalExecutor;
use serde_json::{Value, json};

use starboard::apparatus::{Apparatus, Bench};
use starboard::config::ApparatusConfig;
use starboard::error::{ConfigError, Error, ProtocolError};
use starboard::events::{EventLog, Publisher};

use crate::support::{ScratchRoot, changes, clear, obj, run, settle, sleep_ms};

const DUMMY_RIG: &str = r#"{
    "dummy": true,
    "components": {
        "feeder_left": {"driver": "feeder", "params": {"pulse_dur": 5}},
        "house_lights": {"driver": "lights"},
        "keys": {"driver": "keys"}
    }
}"#;

fn publisher_with_log() -> (Publisher, EventLog) {
    let publisher = Publisher::new();
    let log = EventLog::new();
    publisher.subscribe(log.clone());
    (publisher, log)
}

#[test]
fn dummy_rig_routes_requests_by_address() {
    let ex = LocalExecutor::new();
    let (publisher, log) = publisher_with_log();
    let config = ApparatusConfig::from_json(DUMMY_RIG).unwrap();
    let apparatus = Apparatus::build(&config, &ex, &publisher).unwrap();
    assert_eq!(
        apparatus.addresses().collect::<Vec<_>>(),
        ["feeder_left", "house_lights", "keys"]
    );

    run(&ex, async {
        settle().await;
        let initial = log.take();
        assert_eq!(initial.len(), 3);
        assert!(initial.iter().all(|e| e.changed().is_some()));

        apparatus
            .req("keys", "change-state", json!({"peck_left": 1}))
            .await
            .unwrap();
        let events = log.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].addr(), "keys");

        apparatus
            .req("feeder_left", "change-state", json!({"feeding": true}))
            .await
            .unwrap();
        match apparatus.bench("feeder_left") {
            Some(Bench::Feeder(pwm)) => assert_eq!(pwm.duty(), 10),
            _ => panic!("feeder bench missing"),
        }

        let meta = apparatus.req("house_lights", "get-meta", Value::Null).await.unwrap();
        assert_eq!(meta["type"], "lights");

        assert!(matches!(
            apparatus.req("sound", "get-state", Value::Null).await,
            Err(Error::Protocol(ProtocolError::UnknownAddress(_)))
        ));
    });
}

#[test]
fn dummy_keys_answer_to_benchd_interrupts() {
    let ex = LocalExecutor::new();
    let (publisher, log) = publisher_with_log();
    let config = ApparatusConfig::from_json(DUMMY_RIG).unwrap();
    let apparatus = Apparatus::build(&config, &ex, &publisher).unwrap();
    let Some(Bench::Keys { keys, trigger }) = apparatus.bench("keys").cloned() else {
        panic!("keys bench missing");
    };
    run(&ex, async {
        settle().await;
        clear(&log);
        keys["peck_right"].set_level(starboard::app::ports::Level::High);
        trigger.pulse();
        sleep_ms(10).await;
        assert_eq!(changes(&log.take()), vec![obj(json!({"peck_right": 1}))]);
    });
}

#[test]
fn two_components_cannot_share_a_device() {
    let ex = LocalExecutor::new();
    let config = ApparatusConfig::from_json(
        r#"{
            "dummy": true,
            "components": {
                "feeder_a": {"driver": "feeder"},
                "feeder_b": {"driver": "feeder"}
            }
        }"#,
    )
    .unwrap();
    assert!(matches!(
        Apparatus::build(&config, &ex, &Publisher::new()),
        Err(ConfigError::ResourceInUse(_))
    ));
}

#[test]
fn dummy_aplayer_plays_without_a_sound_card() {
    let ex = LocalExecutor::new();
    let (publisher, log) = publisher_with_log();
    let config = ApparatusConfig::from_json(
        r#"{"dummy": true, "components": {"aplayer": {"driver": "aplayer"}}}"#,
    )
    .unwrap();
    let apparatus = Apparatus::build(&config, &ex, &publisher).unwrap();
    assert!(apparatus.registry().is_claimed("alsa:default"));
    run(&ex, async {
        settle().await;
        clear(&log);
        apparatus
            .req("aplayer", "change-state", json!({"stimulus": "reward.wav", "playing": true}))
            .await
            .unwrap();
        sleep_ms(100).await;
        let events = log.take();
        assert_eq!(
            changes(&events),
            vec![
                obj(json!({"stimulus": "reward.wav", "playing": true})),
                obj(json!({"playing": false}))
            ]
        );
        assert!(events.iter().all(|e| e.addr() == "aplayer"));
    });
}

#[test]
fn two_players_cannot_share_a_sound_card() {
    let ex = LocalExecutor::new();
    let config = ApparatusConfig::from_json(
        r#"{
            "dummy": true,
            "components": {
                "cue": {"driver": "aplayer", "params": {"device": "hw:0"}},
                "noise": {"driver": "aplayer", "params": {"device": "hw:0"}}
            }
        }"#,
    )
    .unwrap();
    assert!(matches!(
        Apparatus::build(&config, &ex, &Publisher::new()),
        Err(ConfigError::ResourceInUse(_))
    ));
}

#[test]
fn bad_params_abort_construction() {
    let ex = LocalExecutor::new();
    let config = ApparatusConfig::from_json(
        r#"{"dummy": true, "components": {"lights": {"driver": "lights", "params": {"lat": 123}}}}"#,
    )
    .unwrap();
    assert!(matches!(
        Apparatus::build(&config, &ex, &Publisher::new()),
        Err(ConfigError::InvalidParam { field: "lat", .. })
    ));

    let config = ApparatusConfig::from_json(
        r#"{"dummy": true, "components": {"f": {"driver": "feeder", "params": {"speed": 3}}}}"#,
    )
    .unwrap();
    assert!(matches!(
        Apparatus::build(&config, &ex, &Publisher::new()),
        Err(ConfigError::UnknownParam(_))
    ));
}

#[test]
fn disconnect_all_releases_every_resource() {
    let ex = LocalExecutor::new();
    let config = ApparatusConfig::from_json(DUMMY_RIG).unwrap();
    let apparatus = Apparatus::build(&config, &ex, &Publisher::new()).unwrap();
    assert!(!apparatus.registry().is_empty());
    run(&ex, async {
        apparatus.disconnect_all().await;
        assert!(apparatus.registry().is_empty());
        assert!(matches!(
            apparatus.req("keys", "get-state", Value::Null).await,
            Err(Error::Protocol(ProtocolError::Disconnected))
        ));
        apparatus.disconnect_all().await;
    });
}

// ── sysfs mode against a scratch tree ────────────────────────

fn touch(dir: &Path, attr: &str, value: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(attr), value).unwrap();
}

fn fake_sysfs(root: &Path) {
    fs::create_dir_all(root.join("pwm/pwmchip0/pwm1")).unwrap();
    fs::create_dir_all(root.join("leds/starboard::lights")).unwrap();
    touch(&root.join("gpio/gpiochip496"), "base", "496\n");
    for n in [48, 509, 510, 511] {
        touch(&root.join(format!("gpio/gpio{n}")), "value", "0\n");
    }
}

fn sysfs_config(root: &Path) -> ApparatusConfig {
    let mut config = ApparatusConfig::from_json(
        r#"{
            "components": {
                "feeder_left": {"driver": "feeder", "params": {"pulse_dur": 5}},
                "house_lights": {"driver": "lights"},
                "keys": {"driver": "keys", "params": {"poll_interval": 1}}
            }
        }"#,
    )
    .unwrap();
    config.sysfs_root = root.to_path_buf();
    config
}

#[test]
fn sysfs_rig_drives_the_class_tree() {
    let root = ScratchRoot::new("rig");
    fake_sysfs(&root);
    let ex = LocalExecutor::new();
    let (publisher, log) = publisher_with_log();
    let apparatus = Apparatus::build(&sysfs_config(&root), &ex, &publisher).unwrap();
    assert!(apparatus.bench("keys").is_none());

    run(&ex, async {
        settle().await;
        clear(&log);

        apparatus
            .req("feeder_left", "change-state", json!({"feeding": true}))
            .await
            .unwrap();
        assert_eq!(
            fs::read_to_string(root.join("pwm/pwmchip0/pwm1/duty_cycle")).unwrap(),
            "100000"
        );

        apparatus
            .req("house_lights", "change-state", json!({"brightness": 42}))
            .await
            .unwrap();
        assert_eq!(
            fs::read_to_string(root.join("leds/starboard::lights/brightness")).unwrap(),
            "42"
        );
        assert_eq!(
            fs::read_to_string(root.join("leds/starboard::lights/trigger")).unwrap(),
            "none"
        );
        clear(&log);

        fs::write(root.join("gpio/gpio510/value"), "1\n").unwrap();
        fs::write(root.join("gpio/gpio48/value"), "1\n").unwrap();
        sleep_ms(50).await;
        assert_eq!(changes(&log.take()), vec![obj(json!({"peck_center": 1}))]);
        assert_eq!(
            fs::read_to_string(root.join("gpio/gpio48/edge")).unwrap(),
            "rising"
        );

        // leaving mid-feed parks the hopper
        apparatus.disconnect_all().await;
        assert!(apparatus.registry().is_empty());
        assert_eq!(
            fs::read_to_string(root.join("pwm/pwmchip0/pwm1/duty_cycle")).unwrap(),
            "0"
        );
    });
}

#[test]
fn keymap_offset_past_the_last_line_is_rejected() {
    let root = ScratchRoot::new("overflow");
    fake_sysfs(&root);
    touch(&root.join("gpio/gpiochip496"), "base", "4294967290\n");
    let ex = LocalExecutor::new();
    let result = Apparatus::build(&sysfs_config(&root), &ex, &Publisher::new());
    assert!(matches!(
        result,
        Err(ConfigError::InvalidParam { field: "keymap", .. })
    ));
}

#[test]
fn sysfs_feeder_needs_a_known_hopper() {
    let root = ScratchRoot::new("hopper");
    fake_sysfs(&root);
    let mut config = sysfs_config(&root);
    config.components = ApparatusConfig::from_json(
        r#"{"components": {"f": {"driver": "feeder", "params": {"device": "starboard:hopper:middle"}}}}"#,
    )
    .unwrap()
    .components;
    let ex = LocalExecutor::new();
    assert!(matches!(
        Apparatus::build(&config, &ex, &Publisher::new()),
        Err(ConfigError::InvalidParam { field: "device", .. })
    ));
}

#[test]
fn sysfs_rig_without_hardware_is_unavailable() {
    let root = ScratchRoot::new("empty");
    let ex = LocalExecutor::new();
    let result = Apparatus::build(&sysfs_config(&root), &ex, &Publisher::new());
    assert!(matches!(result, Err(ConfigError::Unavailable { .. })));
}
