//! Sun position models driving the house lights.
//!
//! [`solar_altitude`] is the usual low-precision ephemeris (good to a
//! fraction of a degree, which is plenty for lighting). [`synthetic_altitude`]
//! fakes a day from fixed dawn/dusk hours: it climbs linearly from 0 at
//! dawn to π at dusk and keeps rising through the night, so its sine is
//! negative after dark.

use core::f64::consts::PI;

use chrono::{DateTime, Utc};

const RAD: f64 = PI / 180.0;
const DAY_MS: f64 = 86_400_000.0;
const J1970: f64 = 2_440_588.0;
const J2000: f64 = 2_451_545.0;
/// Obliquity of the ecliptic.
const OBLIQUITY: f64 = RAD * 23.4397;

fn days_since_j2000(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / DAY_MS - 0.5 + J1970 - J2000
}

fn solar_mean_anomaly(d: f64) -> f64 {
    RAD * (357.5291 + 0.985_600_28 * d)
}

fn ecliptic_longitude(m: f64) -> f64 {
    let center = RAD * (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin());
    let perihelion = RAD * 102.9372;
    m + center + perihelion + PI
}

fn declination(l: f64) -> f64 {
    (l.sin() * OBLIQUITY.sin()).asin()
}

fn right_ascension(l: f64) -> f64 {
    (l.sin() * OBLIQUITY.cos()).atan2(l.cos())
}

fn sidereal_time(d: f64, lw: f64) -> f64 {
    RAD * (280.16 + 360.985_623_5 * d) - lw
}

/// Altitude of the sun above the horizon, in radians, at `time` seen from
/// `lat`/`lon` (degrees, east positive).
pub fn solar_altitude(time: DateTime<Utc>, lat: f64, lon: f64) -> f64 {
    let lw = RAD * -lon;
    let phi = RAD * lat;
    let d = days_since_j2000(time);
    let l = ecliptic_longitude(solar_mean_anomaly(d));
    let dec = declination(l);
    let hour_angle = sidereal_time(d, lw) - right_ascension(l);
    (phi.sin() * dec.sin() + phi.cos() * dec.cos() * hour_angle.cos()).asin()
}

/// Fake altitude for local `hour` (fractional) given dawn and dusk hours.
pub fn synthetic_altitude(hour: f64, dawn: f64, dusk: f64) -> f64 {
    let since_dawn = (hour + 24.0 - dawn) % 24.0;
    let day_length = (dusk + 24.0 - dawn) % 24.0;
    (since_dawn / day_length).min(2.0) * PI
}

/// `max(0, round(max * sin(altitude)))`
pub fn brightness_for(altitude: f64, max: u32) -> u32 {
    let b = (f64::from(max) * altitude.sin()).round();
    if b > 0.0 { (b as u32).min(max) } else { 0 }
}

pub fn is_daytime(altitude: f64) -> bool {
    altitude.sin() > 0.0
}
