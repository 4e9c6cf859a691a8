use inverter_domain::domain::{Channel, DerivedPoint, ResampledRow, ResampledTable, SourceResult};

const WATTS_PER_KILOWATT: f64 = 1000.0;

/// Solar, battery and grid power in kW for one bucket.
///
/// `battery_power` is discharge minus charge: positive while the battery
/// feeds the house, negative while it charges. A missing operand makes the
/// derived value missing.
pub fn derive_point(row: &ResampledRow) -> DerivedPoint {
    let v = &row.values;

    let solar = match (v[Channel::Ppv1], v[Channel::Ppv2], v[Channel::Ppv3]) {
        (Some(a), Some(b), Some(c)) => Some(a + b + c),
        _ => None,
    };
    let battery = v[Channel::PDisCharge]
        .zip(v[Channel::PCharge])
        .map(|(discharge, charge)| discharge - charge);
    let grid = v[Channel::PLoad];

    DerivedPoint {
        bucket: row.bucket,
        solar_power: solar.map(to_kilowatts),
        battery_power: battery.map(to_kilowatts),
        grid_power: grid.map(to_kilowatts),
    }
}

pub fn derive_metrics(table: &ResampledTable) -> SourceResult {
    SourceResult {
        serial_number: table.serial_number.clone(),
        label: table.label.clone(),
        points: table.rows.iter().map(derive_point).collect(),
    }
}

fn to_kilowatts(watts: f64) -> f64 {
    watts / WATTS_PER_KILOWATT
}
