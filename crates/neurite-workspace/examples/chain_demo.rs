//! Two networks coupled inside one simulation context.
//!
//! Run with `RUST_LOG=debug cargo run -p neurite-workspace --example chain_demo`.

use std::time::Duration;

use neurite_core::lock_recover;
use neurite_network::{LinearRule, Network, PriorityUpdate};
use neurite_workspace::{AttributeRef, SimulationConfig, SimulationContext};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let ctx = SimulationContext::new(SimulationConfig::default())?;

    // A 64-unit chain updated in parallel, one hop per step.
    let mut sensor = Network::new("sensor");
    let units = (0..64)
        .map(|_| sensor.add_unit(LinearRule::identity()))
        .collect::<Result<Vec<_>, _>>()?;
    for pair in units.windows(2) {
        sensor.connect(pair[0], pair[1], 1.0)?;
    }
    sensor.set_value(units[0], 1.0)?;
    sensor.set_clamped(units[0], true)?;
    sensor.set_action(Box::new(ctx.buffered_update().with_chunk_size(16)));
    let (sensor_id, sensor) = ctx.add_network(sensor);

    // A small motor network swept in priority order.
    let mut motor = Network::new("motor");
    let drive = motor.add_unit(LinearRule {
        slope: 0.5,
        bias: 0.0,
    })?;
    let out = motor.add_unit(LinearRule::identity())?;
    motor.connect(drive, out, 2.0)?;
    motor.set_action(Box::new(PriorityUpdate::new()));
    let (motor_id, motor) = ctx.add_network(motor);

    let last = units[units.len() - 1];
    ctx.couple(
        AttributeRef::new(sensor_id, format!("unit:{last}")),
        AttributeRef::new(motor_id, format!("unit:{drive}")),
    )?;

    ctx.driver().set_step_delay(1);
    ctx.driver().run(Some(80))?;
    while ctx.driver().is_running() {
        std::thread::sleep(Duration::from_millis(10));
    }
    if let Some(report) = ctx.driver().join() {
        println!("ran {} steps ({:?})", report.steps, report.reason);
    }

    println!(
        "sensor tail = {:?}, motor out = {:?}",
        lock_recover(&sensor).value(last),
        lock_recover(&motor).value(out)
    );
    Ok(())
}
