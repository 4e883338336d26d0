//! Creates a sample mesh dataset for trying out mesh_stats.
//!
//! The file holds a small synthetic tidal run: water depth, bottom elevation,
//! a rotating velocity field and a Strickler friction coefficient over a
//! line of mesh nodes.

use ndarray::{Array1, Array2};
use netcdf::create;
use std::f64::consts::PI;
use std::path::Path;

const FRAMES: usize = 48;
const NODES: usize = 200;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_path = Path::new("test_mesh.nc");

    println!("🔨 Creating test mesh dataset: {}", output_path.display());

    if output_path.exists() {
        std::fs::remove_file(output_path)?
    }

    let mut file = create(output_path)?;

    file.add_attribute("title", "Synthetic tidal mesh run")?;
    file.add_attribute("created_by", "create_test_dataset.rs")?;

    file.add_dimension("time", FRAMES)?;
    file.add_dimension("node", NODES)?;

    {
        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", "seconds")?;
        time_var.put_attribute("long_name", "time")?;
        let times = Array1::from_iter((0..FRAMES).map(|t| t as f64 * 1800.0));
        time_var.put(times.view(), ..)?;
    }

    // bottom slopes from -2 m to -12 m across the line
    let bottom = |node: usize| -2.0 - 10.0 * node as f64 / (NODES - 1) as f64;
    let tide = |t: usize| 1.5 * (2.0 * PI * t as f64 / 24.0).sin();
    let phase = |node: usize| node as f64 / NODES as f64 * PI;

    let variables: [(&str, &str, &str, Box<dyn Fn(usize, usize) -> f64>); 5] = [
        ("H", "WATER DEPTH", "M", Box::new(move |t, n| tide(t) - bottom(n))),
        ("B", "BOTTOM", "M", Box::new(move |_, n| bottom(n))),
        (
            "U",
            "VELOCITY U",
            "M/S",
            Box::new(move |t, n| (2.0 * PI * t as f64 / 24.0 + phase(n)).cos()),
        ),
        (
            "V",
            "VELOCITY V",
            "M/S",
            Box::new(move |t, n| 0.4 * (2.0 * PI * t as f64 / 24.0 + phase(n)).sin()),
        ),
        ("W", "BOTTOM FRICTION", "", Box::new(|_, n| 30.0 + (n % 20) as f64)),
    ];

    for (id, long_name, units, value) in &variables {
        let mut var = file.add_variable::<f32>(id, &["time", "node"])?;
        var.put_attribute("long_name", *long_name)?;
        var.put_attribute("units", *units)?;
        let data = Array2::from_shape_fn((FRAMES, NODES), |(t, n)| value(t, n) as f32);
        var.put(data.view(), ..)?;
    }

    println!("✅ Successfully created test mesh dataset with:");
    println!("   📏 Dimensions: time({FRAMES}), node({NODES})");
    println!("   📈 Variables: H, B, U, V, W");
    println!("\n🧪 Try:");
    println!("   cargo run -- -i test_mesh.nc --list-vars");
    println!("   cargo run -- -i test_mesh.nc -o max.nc --operation max --vars H,U,V,M,S --start 12 --end 36");

    Ok(())
}
