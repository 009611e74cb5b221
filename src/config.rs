use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{fs, io::Write, path::PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Trial and detection settings. Every key is defaulted so a partial profile
/// still loads.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrialSettings {
    pub trial_duration_ms: u64,
    pub min_required_taps: usize,
    pub smoothing_window: usize,
    pub min_peak_distance_ms: u64,
    pub closed_threshold: f64,
    /// Reserved for overlay/boundary consumers; the engine never reads it.
    pub open_threshold: f64,
    /// Recognized but unenforced here; a supervising boundary layer may use
    /// it to abort trials on prolonged tracking loss.
    pub max_hand_loss_ms: u64,
    /// Recognized but unenforced here, same as `max_hand_loss_ms`.
    pub max_inactivity_ms: u64,
}

impl Default for TrialSettings {
    fn default() -> Self {
        Self {
            trial_duration_ms: 10_000,
            min_required_taps: 15,
            smoothing_window: 3,
            min_peak_distance_ms: 30,
            closed_threshold: 30.0,
            open_threshold: 35.0,
            max_hand_loss_ms: 2_000,
            max_inactivity_ms: 5_000,
        }
    }
}

/// Capture hints handed to the tracking collaborator; nothing in the engine
/// depends on them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    pub min_detection_confidence: f64,
    pub min_tracking_confidence: f64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub meta: Meta,
    pub trial: TrialSettings,
    pub capture: CaptureSettings,
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> PathBuf {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".config").join("tapmetry")
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.reload()?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(name: &str) -> Result<Profile> {
        let path = profiles_dir().join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        let profile: Profile =
            toml::from_str(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        serde_json::json!({
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profiles": self.list_profiles(),
            "trial_duration_ms": self.profile.trial.trial_duration_ms,
            "min_required_taps": self.profile.trial.min_required_taps,
            "hints": {
                "frame_stream": "pipe tracker JSONL into `tapmetry run`, one frame record per line",
                "profiles": "drop additional <name>.toml files into the profiles dir, then `tapmetry use <name>`"
            }
        })
    }
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    let t = &p.trial;
    if t.trial_duration_ms == 0 {
        return Err(anyhow!("trial.trial_duration_ms must be positive"));
    }
    if t.smoothing_window == 0 {
        return Err(anyhow!("trial.smoothing_window must be at least 1"));
    }
    if t.min_peak_distance_ms == 0 {
        return Err(anyhow!("trial.min_peak_distance_ms must be positive"));
    }
    if t.closed_threshold <= 0.0 {
        return Err(anyhow!("trial.closed_threshold must be positive"));
    }
    if t.open_threshold < t.closed_threshold {
        return Err(anyhow!(
            "trial.open_threshold must not be below trial.closed_threshold"
        ));
    }
    for (key, v) in [
        (
            "capture.min_detection_confidence",
            p.capture.min_detection_confidence,
        ),
        (
            "capture.min_tracking_confidence",
            p.capture.min_tracking_confidence,
        ),
    ] {
        if !(0.0..=1.0).contains(&v) {
            return Err(anyhow!("{key} must be within [0, 1]"));
        }
    }
    Ok(())
}
