//! The `ttsurvey init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("ttsurvey.toml").exists() {
        println!("ttsurvey.toml already exists, skipping.");
    } else {
        std::fs::write("ttsurvey.toml", SAMPLE_CONFIG)?;
        println!("Created ttsurvey.toml");
    }

    let sentences_path = std::path::Path::new("sentences.csv");
    if sentences_path.exists() {
        println!("sentences.csv already exists, skipping.");
    } else {
        std::fs::write(sentences_path, SAMPLE_SENTENCES)?;
        println!("Created sentences.csv");
    }

    println!("\nNext steps:");
    println!("  1. Put audio files under audio/<model>/<sentence_id>.m4a");
    println!("  2. Run: ttsurvey validate --check-audio");
    println!("  3. Run: ttsurvey take");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# ttsurvey configuration

default_store = "local"

[study]
name = "Hebrew TTS listening test"
# absolute: 1-5 scores per model; comparative: one -3..3 score per pair
scheme = "absolute"
models = ["phonikud_stts2", "roboshaul_nakdimon", "gemini_unvocalized", "piper-phonikud"]
# ratings, audio or both
readiness = "ratings"
sentences = "sentences.csv"
audio_base = "audio"
audio_extension = "m4a"
locale = "he"

[cache]
dir = ".ttsurvey-cache"
debounce_ms = 500

[stores.local]
type = "file"
dir = "ttsurvey-data"

[stores.firestore]
type = "firestore"
project_id = "phonikud-user-study"
api_key = "${TTSURVEY_FIRESTORE_API_KEY}"
"#;

const SAMPLE_SENTENCES: &str = "\
s1|שלום, מה שלומך היום?
s2|הספר מונח על השולחן ליד החלון.
s3|מחר נצא לטיול בהרים אם מזג האוויר יאפשר.
";
