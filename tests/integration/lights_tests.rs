//! Lights component: manual brightness and the solar clock.

use chrono::{DateTime, TimeZone, Utc};
use edge_executor::LocalExecutor;
use serde_json::{Value, json};

use starboard::adapters::dummy::{DummyLed, LedBench};
use starboard::adapters::registry::ResourceRegistry;
use starboard::adapters::time::FixedClock;
use starboard::app::service::ComponentHandle;
use starboard::config::{LightsParams, Params};
use starboard::drivers::lights::Lights;
use starboard::events::EventLog;

use crate::support::{changes, clear, obj, run, settle, sleep_ms, warnings};

/// Midnight in Charlottesville, midsummer.
fn night() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 21, 4, 0, 0).unwrap()
}

/// Late morning, same day.
fn day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 21, 16, 0, 0).unwrap()
}

struct Rig {
    lights: ComponentHandle,
    led: LedBench,
    clock: FixedClock,
    log: EventLog,
}

fn spawn_lights(ex: &LocalExecutor<'_>, overrides: Value) -> Rig {
    let registry = ResourceRegistry::new();
    let params = LightsParams::merged(&overrides).unwrap();
    let (led, bench) = DummyLed::new(
        registry.claim(params.device.clone()).unwrap(),
        params.max_brightness,
    );
    let clock = FixedClock::new(night());
    let log = EventLog::new();
    let lights = ComponentHandle::spawn(
        ex,
        "house_lights",
        Lights::new(params, led, clock.clone()),
        log.clone(),
    );
    Rig {
        lights,
        led: bench,
        clock,
        log,
    }
}

#[test]
fn initial_state_matches_defaults() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, Value::Null);
    run(&ex, async {
        settle().await;
        assert_eq!(
            changes(&rig.log.take()),
            vec![obj(json!({
                "brightness": 128,
                "clock_on": false,
                "sun_altitude": 0.0,
                "daytime": null
            }))]
        );
    });
}

#[test]
fn initial_brightness_is_clamped_to_max() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, json!({"max_brightness": 100}));
    run(&ex, async {
        let state = rig.lights.req("get-state", Value::Null).await.unwrap();
        assert_eq!(state["brightness"], 100);
    });
}

#[test]
fn manual_brightness_is_written() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, Value::Null);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        rig.lights
            .req("change-state", json!({"brightness": 200}))
            .await
            .unwrap();
        assert_eq!(changes(&rig.log.take()), vec![obj(json!({"brightness": 200}))]);
        assert_eq!(rig.led.writes(), vec![200]);

        // same value again: nothing to do
        rig.lights
            .req("change-state", json!({"brightness": 200}))
            .await
            .unwrap();
        assert!(rig.log.is_empty());
        assert_eq!(rig.led.writes(), vec![200]);
    });
}

#[test]
fn state_follows_the_adapter_clamp() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, Value::Null);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        rig.lights
            .req("change-state", json!({"brightness": 9999}))
            .await
            .unwrap();
        let state = rig.lights.req("get-state", Value::Null).await.unwrap();
        assert_eq!(state["brightness"], 255);
        assert_eq!(changes(&rig.log.take()), vec![obj(json!({"brightness": 255}))]);
    });
}

#[test]
fn write_failure_warns_and_keeps_state() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, Value::Null);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        rig.led.fail(true);
        let err = rig
            .lights
            .req("change-state", json!({"brightness": 10}))
            .await
            .unwrap_err();
        assert!(err.is_hardware());
        let events = rig.log.take();
        assert!(changes(&events).is_empty());
        assert_eq!(warnings(&events).len(), 1);
        let state = rig.lights.req("get-state", Value::Null).await.unwrap();
        assert_eq!(state["brightness"], 128);
    });
}

#[test]
fn clock_at_night_turns_lights_off() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, Value::Null);
    run(&ex, async {
        settle().await;
        clear(&rig.log);
        rig.lights
            .req("change-state", json!({"clock_on": true}))
            .await
            .unwrap();

        assert_eq!(rig.led.writes(), vec![0]);
        let state = rig.lights.req("get-state", Value::Null).await.unwrap();
        assert_eq!(state["brightness"], 0);
        assert_eq!(state["clock_on"], true);
        assert_eq!(state["daytime"], false);
        assert!(state["sun_altitude"].as_f64().unwrap() < 0.0);

        let events = changes(&rig.log.take());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["clock_on"], true);
        assert_eq!(events[0]["brightness"], 0);
    });
}

#[test]
fn clock_recomputes_every_interval_until_turned_off() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, json!({"clock_interval": 30}));
    run(&ex, async {
        settle().await;
        rig.lights
            .req("change-state", json!({"clock_on": true}))
            .await
            .unwrap();
        clear(&rig.log);

        rig.clock.set(day());
        sleep_ms(100).await;
        let state = rig.lights.req("get-state", Value::Null).await.unwrap();
        assert!(state["brightness"].as_u64().unwrap() > 200, "state {state}");
        assert_eq!(state["daytime"], true);
        assert!(rig.led.writes().len() >= 3);
        // the sun did not move between ticks, so only the first tick changed state
        assert_eq!(changes(&rig.log.take()).len(), 1);

        rig.lights
            .req("change-state", json!({"clock_on": false}))
            .await
            .unwrap();
        assert_eq!(changes(&rig.log.take()), vec![obj(json!({"clock_on": false}))]);
        let writes = rig.led.writes().len();
        rig.clock.set(night());
        sleep_ms(100).await;
        assert_eq!(rig.led.writes().len(), writes);
        assert!(rig.log.is_empty());
    });
}

#[test]
fn brightness_is_ignored_while_clock_runs() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, Value::Null);
    run(&ex, async {
        settle().await;
        rig.lights
            .req("change-state", json!({"clock_on": true}))
            .await
            .unwrap();
        clear(&rig.log);
        rig.lights
            .req("change-state", json!({"brightness": 77}))
            .await
            .unwrap();
        assert!(rig.log.is_empty());
        assert_eq!(rig.led.writes(), vec![0]);

        // turning the clock off in the same request hands brightness back
        rig.lights
            .req("change-state", json!({"clock_on": false, "brightness": 77}))
            .await
            .unwrap();
        assert_eq!(
            changes(&rig.log.take()),
            vec![obj(json!({"clock_on": false, "brightness": 77}))]
        );
    });
}

#[test]
fn disconnect_stops_the_clock() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, json!({"clock_interval": 20}));
    run(&ex, async {
        settle().await;
        rig.lights
            .req("change-state", json!({"clock_on": true}))
            .await
            .unwrap();
        rig.lights.disconnect().await;
        clear(&rig.log);
        let writes = rig.led.writes().len();

        rig.clock.set(day());
        sleep_ms(100).await;
        assert!(rig.log.is_empty());
        assert_eq!(rig.led.writes().len(), writes);
    });
}

#[test]
fn reset_restores_snapshot_and_stops_clock() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, json!({"clock_interval": 20}));
    run(&ex, async {
        settle().await;
        let initial = rig.lights.req("get-state", Value::Null).await.unwrap();
        rig.lights
            .req("change-state", json!({"clock_on": true}))
            .await
            .unwrap();
        rig.lights.req("reset-state", Value::Null).await.unwrap();
        assert_eq!(rig.lights.req("get-state", Value::Null).await.unwrap(), initial);
        assert_eq!(rig.led.brightness(), 128);

        clear(&rig.log);
        sleep_ms(80).await;
        assert!(rig.log.is_empty());
    });
}

#[test]
fn synthetic_day_model_is_selectable() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, json!({"ephemera": false}));
    run(&ex, async {
        rig.lights
            .req("change-state", json!({"clock_on": true}))
            .await
            .unwrap();
        let state = rig.lights.req("get-state", Value::Null).await.unwrap();
        let altitude = state["sun_altitude"].as_f64().unwrap();
        assert!((0.0..=2.0 * std::f64::consts::PI).contains(&altitude));
        assert_eq!(state["daytime"], altitude.sin() > 0.0);
    });
}

#[test]
fn meta_lists_every_state_variable() {
    let ex = LocalExecutor::new();
    let rig = spawn_lights(&ex, Value::Null);
    run(&ex, async {
        let meta = rig.lights.req("get-meta", Value::Null).await.unwrap();
        let state = rig.lights.req("get-state", Value::Null).await.unwrap();
        assert_eq!(meta["type"], "lights");
        assert_eq!(meta["variables"]["brightness"], "0-255");
        for key in state.as_object().unwrap().keys() {
            assert!(meta["variables"].get(key).is_some(), "{key} missing from meta");
        }
    });
}
