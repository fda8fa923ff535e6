use horizon_dcm::{Ahrs, AhrsSettings};
use nalgebra::Vector3;

fn main() {
    let settings = AhrsSettings::default();
    let timestep = settings.timestep(); // 4 ms fusion cycle
    let mut ahrs = Ahrs::with_settings(settings);

    // home attitude: camera level, facing forward
    ahrs.align(0.0, 0.0, 0.0);

    for _ in 0..10 {
        // this loop should repeat once per fusion cycle
        let gyroscope = Vector3::new(0.0, 0.0, 0.0); // replace this with bias-corrected gyro rates in rad/s
        let yaw_rate = 0.0; // replace this with the smoothed yaw rate in rad/s

        ahrs.update(gyroscope * timestep, yaw_rate);

        let attitude = ahrs.attitude().to_degrees();
        println!(
            "Roll: {:.2}, Pitch: {:.2}, Yaw: {:.2}",
            attitude.x, attitude.y, attitude.z
        );
    }
}
