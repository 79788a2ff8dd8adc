//! # Headless Render
//!
//! Renders a small demo scene (ground, two solids, a glass cube, a sun and a
//! point light) off screen and writes the result as a binary PPM.
//!
//! ## Usage:
//! ```bash
//! cargo run --bin render_headless -- [output.ppm] [width] [height]
//! PRISM3D_BACKEND=software cargo run --bin render_headless
//! ```
//!
//! Set `RUST_LOG=debug` to see backend selection and resource creation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use prism3d::prelude::*;

const DEFAULT_OUTPUT: &str = "render.ppm";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

fn parse_dimension(arg: Option<String>, default: u32, name: &str) -> Result<u32> {
    match arg {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid {} '{}'", name, value)),
        None => Ok(default),
    }
}

fn build_scene() -> SceneGraph {
    let mut scene = SceneGraph::new();

    let ground = scene.add_material(Material::new(Color::rgb(0.8, 0.8, 0.8), 0.0, 0.9));
    let red = scene.add_material(Material::new(Color::rgb(0.9, 0.15, 0.1), 0.1, 0.4));
    let gold = scene.add_material(Material::new(Color::rgb(1.0, 0.77, 0.34), 1.0, 0.3));
    let glass = scene.add_material(
        Material::new(Color::rgb(0.4, 0.7, 1.0), 0.0, 0.05)
            .with_alpha(0.35)
            .with_transparent(true),
    );

    scene.add_root(
        SceneNode::primitive("ground", PrimitiveShape::Plane { width: 12.0, depth: 12.0 })
            .with_material(ground)
            .with_shadows(false, true),
    );

    let props = scene.add_root(SceneNode::group("props"));
    scene.add_child(
        props,
        SceneNode::primitive("cube", PrimitiveShape::unit_cube())
            .with_material(red)
            .with_transform(
                Transform::from_position(Vector3::new(-1.2, 0.5, 0.0))
                    .with_rotation(Vector3::new(0.0, 30.0, 0.0)),
            ),
    );
    scene.add_child(
        props,
        SceneNode::primitive("sphere", PrimitiveShape::unit_sphere())
            .with_material(gold)
            .with_transform(Transform::from_position(Vector3::new(1.0, 0.5, 0.5))),
    );
    scene.add_child(
        props,
        SceneNode::primitive("glass", PrimitiveShape::unit_cube())
            .with_material(glass)
            .with_transform(
                Transform::from_position(Vector3::new(0.2, 0.6, 2.0)).with_uniform_scale(1.2),
            ),
    );

    scene.add_root(SceneNode::light(
        "sun",
        Light::directional(Vector3::new(-0.4, -1.0, -0.3))
            .with_intensity(3.0)
            .with_shadows(true),
    ));
    scene.add_root(SceneNode::light(
        "lamp",
        Light::point(Vector3::new(2.0, 2.5, 2.0), 10.0)
            .with_color(Color::rgb(1.0, 0.8, 0.6))
            .with_intensity(8.0)
            .with_shadows(true),
    ));

    scene
}

fn write_ppm(path: &Path, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write!(writer, "P6\n{} {}\n255\n", width, height)?;
    for pixel in rgba.chunks_exact(4) {
        writer.write_all(&pixel[..3])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    let width = parse_dimension(args.next(), DEFAULT_WIDTH, "width")?;
    let height = parse_dimension(args.next(), DEFAULT_HEIGHT, "height")?;
    if width == 0 || height == 0 {
        bail!("output size must be non-zero, got {}x{}", width, height);
    }

    let settings = RenderSettings::from_env();
    let mut renderer = Renderer3D::from_settings(settings).context("no usable graphics backend")?;
    log::info!("Rendering {}x{} with the {} backend", width, height, renderer.backend_name());
    renderer.initialize(width, height)?;

    let scene = build_scene();
    let camera = Camera3D::new(
        Vector3::new(4.0, 4.0, 7.0),
        Vector3::new(0.0, 0.5, 0.0),
        50.0,
        width as f32 / height as f32,
    );
    renderer.render(
        &scene,
        &camera,
        Color::rgb(0.05, 0.06, 0.09),
        Color::rgb(0.6, 0.7, 1.0),
        0.15,
    )?;

    let pixels = renderer.download_pixels()?;
    write_ppm(Path::new(&output), width, height, &pixels)?;
    log::info!("Wrote {}", output);
    Ok(())
}
