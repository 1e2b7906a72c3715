//! Process configuration from the environment, plus optional prompt overrides
//! loaded from TOML.
//!
//! See `Settings` for the recognised variables and `Prompts` for the TOML schema:
//!
//! ```toml
//! [prompts]
//! evaluate_answer = "... {question} ... {answer} ..."
//! ```

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  /// Not validated here; a bad or empty key shows up as a failed upstream call.
  pub gemini_api_key: String,
  pub gemini_base_url: String,
  pub gemini_model: String,
  pub gemini_timeout: Duration,
  pub store_path: PathBuf,
  pub static_dir: PathBuf,
  pub autosave_quiet: Duration,
  pub prompts: Prompts,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      port: DEFAULT_PORT,
      gemini_api_key: String::new(),
      gemini_base_url: DEFAULT_GEMINI_BASE_URL.into(),
      gemini_model: DEFAULT_GEMINI_MODEL.into(),
      gemini_timeout: Duration::from_secs(60),
      store_path: PathBuf::from("./data/sempro_store.json"),
      static_dir: PathBuf::from("./static"),
      autosave_quiet: Duration::from_millis(500),
      prompts: Prompts::default(),
    }
  }
}

impl Settings {
  /// Read settings from the environment. Unparseable numbers fall back to defaults.
  pub fn from_env() -> Self {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
    let d = Settings::default();
    let prompts = get("PROMPTS_CONFIG_PATH")
      .and_then(|p| load_prompts_file(&p))
      .unwrap_or_default();

    Self {
      port: get("PORT").and_then(|p| p.parse().ok()).unwrap_or(d.port),
      gemini_api_key: get("GEMINI_API_KEY").unwrap_or_default(),
      gemini_base_url: get("GEMINI_BASE_URL")
        .map(|u| u.trim_end_matches('/').to_string())
        .unwrap_or(d.gemini_base_url),
      gemini_model: get("GEMINI_MODEL").unwrap_or(d.gemini_model),
      gemini_timeout: get("GEMINI_TIMEOUT_SECS")
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(d.gemini_timeout),
      store_path: get("STORE_PATH").map(PathBuf::from).unwrap_or(d.store_path),
      static_dir: get("STATIC_DIR").map(PathBuf::from).unwrap_or(d.static_dir),
      autosave_quiet: get("AUTOSAVE_DEBOUNCE_MS")
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(d.autosave_quiet),
      prompts,
    }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
struct PromptsFile {
  #[serde(default)]
  prompts: Prompts,
}

/// Instruction templates sent to the generation service.
/// Placeholders: `{bab1}`, `{bab2}`, `{bab3}` and `{question}`, `{answer}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generate_questions: String,
  pub evaluate_answer: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generate_questions: GENERATE_QUESTIONS_TEMPLATE.into(),
      evaluate_answer: EVALUATE_ANSWER_TEMPLATE.into(),
    }
  }
}

/// Load prompt overrides from a TOML file. On any IO/parse error, returns None.
fn load_prompts_file(path: &str) -> Option<Prompts> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<PromptsFile>(&s) {
      Ok(file) => {
        info!(target: "sempro_backend", %path, "Loaded prompt overrides (TOML)");
        Some(file.prompts)
      }
      Err(e) => {
        error!(target: "sempro_backend", %path, error = %e, "Failed to parse prompt TOML");
        None
      }
    },
    Err(e) => {
      error!(target: "sempro_backend", %path, error = %e, "Failed to read prompt TOML");
      None
    }
  }
}

const GENERATE_QUESTIONS_TEMPLATE: &str = r#"Berdasarkan proposal berikut:

BAB 1 - PENDAHULUAN:
{bab1}

BAB 2 - TINJAUAN PUSTAKA/LANDASAN TEORI:
{bab2}

BAB 3 - METODOLOGI:
{bab3}

🔍 **INSTRUKSI KHUSUS UNTUK ANDA (BERSIFAT WAJIB)**
Anda berperan sebagai **dosen penguji utama dalam seminar proposal skripsi**. Tugas Anda adalah mengajukan pertanyaan yang tajam, menusuk logika mahasiswa, dan menuntut argumen yang kuat dan akademis. Anda dikenal sebagai dosen perfeksionis, kritis, dan tidak segan membongkar kelemahan proposal secara langsung. Tunjukkan gaya tersebut dalam setiap pertanyaan.

🎯 **TUJUAN PERTANYAAN:**
- Menguji seberapa dalam mahasiswa memahami isi proposalnya sendiri.
- Mempertanyakan keabsahan dan relevansi latar belakang dan rumusan masalah.
- Mengkritik pilihan teori dan metodologi secara ketat.
- Menggali potensi bias, celah logika, dan kelemahan teknis-metodologis.
- Memastikan kontribusi ilmiah tidak hanya sekadar klaim belaka.

🧠 **GAYA BERTANYA YANG HARUS DIGUNAKAN:**
- Nada formal akademik, tajam, dan langsung ke inti permasalahan.
- Hindari pertanyaan basa-basi, buat seolah mahasiswa sedang "diadili secara ilmiah".
- Gunakan variasi kalimat tanya seperti:
  - “Di mana letak logika Anda saat menyusun…”
  - “Apa justifikasi ilmiah Anda ketika…”
  - “Jika pendekatan ini ternyata gagal, bagaimana Anda mempertanggungjawabkannya?”
  - “Sejauh mana Anda menyadari kelemahan teori yang Anda gunakan?”
  - “Apakah Anda benar-benar memahami implikasi dari…”
  - “Mengapa Anda tidak mempertimbangkan alternatif yang lebih relevan seperti…”
- Boleh mengandung pertanyaan hipotetik dan analogi yang menekan logika mahasiswa.

📝 **FORMAT WAJIB OUTPUT:**
1. Tulis dalam bentuk daftar bernomor (1. … 2. … 3. … dst).
2. Setiap nomor harus berupa **satu pertanyaan kritis, jelas, dan langsung menusuk substansi**.
3. Setiap pertanyaan **harus diakhiri tanda tanya (?)** dan **tidak boleh digabung dalam paragraf**.
4. Tidak ada narasi pembuka, penjelasan tambahan, atau paragraf deskriptif — hanya daftar pertanyaan.
5. Hindari pertanyaan umum yang dapat dijawab dengan jawaban normatif.

❌ **JANGAN LAKUKAN HAL BERIKUT:**
- Menggabungkan semua pertanyaan ke dalam satu paragraf panjang.
- Tidak menggunakan tanda baca yang tepat.
- Mengulang-ulang bentuk pertanyaan dengan kalimat yang hanya sedikit berbeda.
- Bertanya dengan nada sopan yang tidak mencerminkan evaluasi tajam.

✅ **OUTPUT YANG DIHARAPKAN (CONTOH):**
1. Apa validitas akademik dari pemilihan objek penelitian ini jika Anda tidak menyebutkan kriteria seleksi yang jelas?
2. Bagaimana Anda membedakan antara asumsi pribadi dan landasan teoretis dalam rumusan masalah yang Anda ajukan?
3. Jika metode ini ternyata tidak menghasilkan data yang sesuai, apa alternatif konkret yang telah Anda siapkan?
4. Apakah Anda menyadari bahwa teori X yang Anda gunakan sebenarnya telah dikritik habis dalam studi tahun 2020?
... dan seterusnya.
"#;

const EVALUATE_ANSWER_TEMPLATE: &str = r#"Sebagai penguji seminar proposal, evaluasi jawaban berikut:

PERTANYAAN:
{question}

JAWABAN:
{answer}

Buat evaluasi singkat dalam 2–3 kalimat tanpa menulis ulang pertanyaan mencakup:
Penilaian terhadap kualitas jawaban (baik/cukup/kurang), disertai alasan singkat.
Apakah penjawab memahami isi proposalnya secara keseluruhan?
Saran atau masukan yang bisa membantu memperjelas dan memperkuat isi jawaban.
Hal-hal yang bisa dipertimbangkan ke depannya agar penelitian lebih matang.
Tambahkan kalimat penutup yang positif dan memotivasi, dengan bahasa yang hangat namun tetap akademis.

Gunakan bahasa yang jelas, sopan, tidak menghakimi, dan tetap menjaga nuansa akademik serta konstruktif."#;

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k| map.get(k).cloned()
  }

  #[test]
  fn defaults_when_environment_is_empty() {
    let s = Settings::from_lookup(lookup(&[]));
    assert_eq!(s.port, DEFAULT_PORT);
    assert!(s.gemini_api_key.is_empty());
    assert_eq!(s.gemini_model, DEFAULT_GEMINI_MODEL);
    assert_eq!(s.autosave_quiet, Duration::from_millis(500));
    assert!(s.prompts.generate_questions.contains("{bab3}"));
  }

  #[test]
  fn environment_overrides_and_bad_numbers() {
    let s = Settings::from_lookup(lookup(&[
      ("PORT", "8080"),
      ("GEMINI_BASE_URL", "http://localhost:9999/v1/"),
      ("GEMINI_TIMEOUT_SECS", "soon"),
      ("AUTOSAVE_DEBOUNCE_MS", "250"),
    ]));
    assert_eq!(s.port, 8080);
    assert_eq!(s.gemini_base_url, "http://localhost:9999/v1");
    assert_eq!(s.gemini_timeout, Duration::from_secs(60));
    assert_eq!(s.autosave_quiet, Duration::from_millis(250));
  }

  #[test]
  fn prompt_file_overrides_one_template() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prompts.toml");
    std::fs::write(&path, "[prompts]\nevaluate_answer = \"Nilai: {question} / {answer}\"\n").unwrap();
    let path_str = path.to_string_lossy().to_string();
    let s = Settings::from_lookup(lookup(&[("PROMPTS_CONFIG_PATH", path_str.as_str())]));
    assert_eq!(s.prompts.evaluate_answer, "Nilai: {question} / {answer}");
    assert!(s.prompts.generate_questions.starts_with("Berdasarkan proposal"));
  }

  #[test]
  fn unreadable_prompt_file_keeps_defaults() {
    let s = Settings::from_lookup(lookup(&[("PROMPTS_CONFIG_PATH", "/definitely/not/here.toml")]));
    assert!(s.prompts.evaluate_answer.starts_with("Sebagai penguji"));
  }
}
