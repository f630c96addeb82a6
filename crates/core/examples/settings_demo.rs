//! Example demonstrating presets, persisted settings and both render paths
//!
//! Run with: cargo run --package soundstage-core --example settings_demo

use soundstage_core::{
    environment_names, preset_names, Engine, Frame, PersistedSettings, SettingsPatch,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("soundstage_core=debug,info")
        .init();

    println!("=== Soundstage Settings Demo ===\n");

    // 1. Preset tables
    println!("1. Tone presets: {}", preset_names().join(", "));
    println!("   Environments: {}", environment_names().join(", "));

    // 2. Persisted settings resolve through the overlay rule
    println!("\n2. Resolving persisted settings...");
    let persisted = PersistedSettings::from_toml_str(
        r#"
        preset = "流行"
        environment = "房间"

        [overlay]
        bass = 60
        "#,
    )?;
    let settings = persisted.resolve()?;
    println!("   ✓ {:?}", settings);
    println!("   Stored form:\n{}", persisted.to_toml_string()?);

    // 3. Offline render
    println!("3. Rendering one second offline...");
    let mut engine = Engine::new(44100)?;
    let input: Vec<Frame> = (0..44100)
        .map(|i| Frame::mono(0.5 * (i as f32 * 0.02).sin()))
        .collect();
    let output = engine.process_buffer(&input, &settings)?;
    let peak = output.iter().map(Frame::peak).fold(0.0, f32::max);
    println!("   ✓ {} frames, peak {:.4}", output.len(), peak);

    // 4. Streaming with a live settings change
    println!("\n4. Streaming in 1024-frame chunks...");
    engine.replace_settings(settings);
    for (i, chunk) in input.chunks(1024).enumerate() {
        if i == 10 {
            engine.update_settings(&SettingsPatch {
                environment: Some("hall".to_string()),
                ..SettingsPatch::default()
            })?;
            println!("   Switched environment to hall at chunk {}", i);
        }
        let mut block = chunk.to_vec();
        engine.process_chunk(&mut block)?;
    }
    println!("   ✓ Final settings: {:?}", engine.settings());

    println!("\n=== Demo Complete ===");
    Ok(())
}
