//! Key panel component: simulated presses and interrupt servicing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use edge_executor::LocalExecutor;
use serde_json::{Value, json};

use starboard::adapters::dummy::{DummyGpio, GpioBench};
use starboard::adapters::gpio::{LineDirection, SysfsGpio};
use starboard::adapters::registry::ResourceRegistry;
use starboard::app::ports::Level;
use starboard::app::service::ComponentHandle;
use starboard::config::KeyPanelParams;
use starboard::drivers::keypanel::KeyPanel;
use starboard::error::{ConfigError, Error, ProtocolError};
use starboard::events::EventLog;

use crate::support::{ScratchRoot, changes, clear, obj, run, settle, sleep_ms, warnings};

struct Rig {
    panel: ComponentHandle,
    keys: BTreeMap<String, GpioBench>,
    trigger: GpioBench,
    log: EventLog,
}

impl Rig {
    fn key(&self, name: &str) -> &GpioBench {
        &self.keys[name]
    }
}

fn lines(
    registry: &ResourceRegistry,
    params: &KeyPanelParams,
) -> (BTreeMap<String, DummyGpio>, BTreeMap<String, GpioBench>, DummyGpio, GpioBench) {
    let mut lines = BTreeMap::new();
    let mut benches = BTreeMap::new();
    for (name, offset) in &params.keymap {
        let (line, bench) = DummyGpio::new(registry.claim(format!("gpio{}", 496 + offset)).unwrap());
        lines.insert(name.clone(), line);
        benches.insert(name.clone(), bench);
    }
    let (trigger, trigger_bench) = DummyGpio::new(registry.claim("gpio48").unwrap());
    (lines, benches, trigger, trigger_bench)
}

fn spawn_panel(ex: &LocalExecutor<'_>) -> Rig {
    let registry = ResourceRegistry::new();
    let params = KeyPanelParams::default();
    let (key_lines, keys, trigger, trigger_bench) = lines(&registry, &params);
    let log = EventLog::new();
    let panel = KeyPanel::new(params, key_lines, trigger).unwrap();
    let panel = ComponentHandle::spawn(ex, "keys", panel, log.clone());
    Rig {
        panel,
        keys,
        trigger: trigger_bench,
        log,
    }
}

#[test]
fn starts_with_every_key_released() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        assert_eq!(
            changes(&rig.log.take()),
            vec![obj(json!({"peck_left": 0, "peck_center": 0, "peck_right": 0}))]
        );
    });
}

#[test]
fn simulated_press_changes_one_key() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        rig.panel
            .req("change-state", json!({"peck_left": 1}))
            .await
            .unwrap();
        assert_eq!(changes(&rig.log.take()), vec![obj(json!({"peck_left": 1}))]);
        let state = rig.panel.req("get-state", Value::Null).await.unwrap();
        assert_eq!(state, json!({"peck_left": 1, "peck_center": 0, "peck_right": 0}));
    });
}

#[test]
fn simulated_changes_are_batched() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        rig.panel
            .req(
                "change-state",
                json!({"peck_left": 1, "peck_right": true, "peck_center": 0}),
            )
            .await
            .unwrap();
        assert_eq!(
            changes(&rig.log.take()),
            vec![obj(json!({"peck_left": 1, "peck_right": 1}))]
        );
    });
}

#[test]
fn empty_or_unknown_changes_reply_ok_silently() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        rig.panel.req("change-state", json!({})).await.unwrap();
        rig.panel
            .req("change-state", json!({"peck_nose": 1}))
            .await
            .unwrap();
        rig.panel
            .req("change-state", json!({"peck_left": 0}))
            .await
            .unwrap();
        assert!(rig.log.is_empty());
    });
}

#[test]
fn malformed_level_is_rejected_whole() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        let reply = rig
            .panel
            .req("change-state", json!({"peck_left": 1, "peck_right": 5}))
            .await;
        assert!(matches!(reply, Err(Error::Protocol(ProtocolError::Malformed(_)))));
        assert!(rig.log.is_empty());
        let state = rig.panel.req("get-state", Value::Null).await.unwrap();
        assert_eq!(state["peck_left"], 0);
    });
}

#[test]
fn interrupt_rereads_keys() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        clear(&rig.log);

        rig.key("peck_center").set_level(Level::High);
        rig.trigger.pulse();
        sleep_ms(10).await;
        assert_eq!(changes(&rig.log.take()), vec![obj(json!({"peck_center": 1}))]);

        rig.key("peck_center").set_level(Level::Low);
        rig.trigger.pulse();
        sleep_ms(10).await;
        assert_eq!(changes(&rig.log.take()), vec![obj(json!({"peck_center": 0}))]);
    });
}

#[test]
fn keys_changed_in_one_interrupt_share_an_event() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        rig.key("peck_left").set_level(Level::High);
        rig.key("peck_right").set_level(Level::High);
        rig.trigger.pulse();
        sleep_ms(10).await;
        assert_eq!(
            changes(&rig.log.take()),
            vec![obj(json!({"peck_left": 1, "peck_right": 1}))]
        );
    });
}

#[test]
fn interrupt_without_change_is_silent() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        rig.trigger.pulse();
        sleep_ms(10).await;
        assert!(rig.log.is_empty());
    });
}

#[test]
fn failed_key_read_warns_and_others_still_update() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        rig.key("peck_left").fail_reads(true);
        rig.key("peck_left").set_level(Level::High);
        rig.key("peck_right").set_level(Level::High);
        rig.trigger.pulse();
        sleep_ms(10).await;

        let events = rig.log.take();
        let warned = warnings(&events);
        assert_eq!(warned.len(), 1);
        assert!(warned[0].contains("error reading from peck_left"));
        assert_eq!(changes(&events), vec![obj(json!({"peck_right": 1}))]);
    });
}

#[test]
fn disconnect_closes_interrupt_watch() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        assert_eq!(rig.trigger.open_watches(), 1);
        rig.panel.disconnect().await;
        assert_eq!(rig.trigger.open_watches(), 0);
        clear(&rig.log);

        rig.key("peck_left").set_level(Level::High);
        rig.trigger.pulse();
        sleep_ms(10).await;
        assert!(rig.log.is_empty());
        rig.panel.disconnect().await;
    });
}

#[test]
fn reset_releases_every_key() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        settle().await;
        rig.panel
            .req("change-state", json!({"peck_left": 1, "peck_center": 1}))
            .await
            .unwrap();
        clear(&rig.log);
        rig.panel.req("reset-state", Value::Null).await.unwrap();
        assert_eq!(
            changes(&rig.log.take()),
            vec![obj(json!({"peck_left": 0, "peck_center": 0}))]
        );
    });
}

#[test]
fn meta_describes_binary_inputs() {
    let ex = LocalExecutor::new();
    let rig = spawn_panel(&ex);
    run(&ex, async {
        let meta = rig.panel.req("get-meta", Value::Null).await.unwrap();
        assert_eq!(meta["type"], "key");
        assert_eq!(meta["dir"], "input");
        assert_eq!(meta["variables"]["peck_right"], json!([0, 1]));
        let params = rig.panel.req("get-params", Value::Null).await.unwrap();
        assert_eq!(params["interrupt_gpio"], 48);
        assert_eq!(params["keymap"]["peck_left"], 13);
    });
}

#[test]
fn lines_must_match_keymap() {
    let registry = ResourceRegistry::new();
    let params = KeyPanelParams::default();
    let (mut key_lines, _keys, trigger, _t) = lines(&registry, &params);
    key_lines.remove("peck_right");
    assert!(matches!(
        KeyPanel::new(params, key_lines, trigger),
        Err(ConfigError::InvalidParam { field: "keymap", .. })
    ));
}

fn sysfs_line(registry: &ResourceRegistry, root: &Path, n: u32) -> SysfsGpio {
    let dir = root.join(format!("gpio/gpio{n}"));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("value"), "0\n").unwrap();
    SysfsGpio::open(registry, root, n, LineDirection::In, true)
        .unwrap()
        .with_poll_interval(Duration::from_millis(1))
}

#[test]
fn unreadable_interrupt_line_warns_once_per_outage() {
    let root = ScratchRoot::new("trigger");
    let registry = ResourceRegistry::new();
    let params = KeyPanelParams::default();
    let keys = params
        .keymap
        .iter()
        .map(|(name, offset)| (name.clone(), sysfs_line(&registry, &root, 496 + offset)))
        .collect();
    let trigger = sysfs_line(&registry, &root, 48);
    let log = EventLog::new();
    let ex = LocalExecutor::new();
    let panel = KeyPanel::new(params, keys, trigger).unwrap();
    let panel = ComponentHandle::spawn(&ex, "keys", panel, log.clone());
    let trigger_value = root.join("gpio/gpio48/value");

    run(&ex, async {
        settle().await;
        clear(&log);

        fs::remove_file(&trigger_value).unwrap();
        sleep_ms(100).await;
        let events = log.take();
        assert_eq!(warnings(&events).len(), 1, "{events:?}");
        assert!(changes(&events).is_empty());

        // the next edge ends the outage and is serviced as usual
        fs::write(root.join("gpio/gpio510/value"), "1\n").unwrap();
        fs::write(&trigger_value, "1\n").unwrap();
        sleep_ms(30).await;
        let events = log.take();
        assert!(warnings(&events).is_empty());
        assert_eq!(changes(&events), vec![obj(json!({"peck_center": 1}))]);

        fs::remove_file(&trigger_value).unwrap();
        sleep_ms(30).await;
        assert_eq!(warnings(&log.take()).len(), 1);

        panel.disconnect().await;
    });
}
