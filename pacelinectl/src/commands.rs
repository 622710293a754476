use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use paceline_config::PacelineConfig;
use paceline_core::background::{BackgroundRelay, TabStatus};
use paceline_core::model::{ChannelName, Speed, SpeedPreset};
use paceline_core::orchestrator::RetryOutcome;
use paceline_core::policy::{CHANNELS_KEY, DEFAULT_SPEED_KEY, JsonFileStore, SpeedPolicyStore};
use paceline_core::settings::{DetachedTabs, SettingsPanel};
use paceline_core::sim::{RecordingClock, SimulatedBrowser, SimulatedPage};
use serde_json::{Map, Value, json};

/// Loaded configuration plus the settings file every command works on.
pub struct Session {
    config: PacelineConfig,
    store: Arc<JsonFileStore>,
}

impl Session {
    pub fn new(config: PacelineConfig, store_path: PathBuf) -> Self {
        Self {
            config,
            store: Arc::new(JsonFileStore::new(store_path)),
        }
    }

    fn policy(&self) -> SpeedPolicyStore<JsonFileStore> {
        SpeedPolicyStore::new(Arc::clone(&self.store))
    }

    async fn panel(&self) -> SettingsPanel<JsonFileStore, DetachedTabs> {
        SettingsPanel::open(
            Arc::clone(&self.store),
            Arc::new(DetachedTabs),
            self.config.site.clone(),
        )
        .await
    }
}

fn speed_label(speed: Speed) -> String {
    SpeedPreset::from_speed(speed)
        .map(SpeedPreset::label)
        .unwrap_or_else(|| speed.to_string())
}

fn store_error(session: &Session) -> String {
    format!("failed to use settings file {}", session.store.path().display())
}

pub async fn list(session: &Session, as_json: bool) -> Result<()> {
    let snapshot = session
        .panel()
        .await
        .snapshot()
        .await
        .with_context(|| store_error(session))?;

    if as_json {
        let channels: Map<String, Value> = snapshot
            .overrides
            .iter()
            .map(|(channel, speed)| (channel.to_string(), json!(speed.to_string())))
            .collect();
        let layout = json!({
            CHANNELS_KEY: channels,
            DEFAULT_SPEED_KEY: snapshot.default_speed.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    println!("Default speed: {}", speed_label(snapshot.default_speed));
    if snapshot.overrides.is_empty() {
        println!("No channel overrides");
        return Ok(());
    }
    let width = snapshot
        .overrides
        .iter()
        .map(|(channel, _)| channel.as_str().chars().count())
        .max()
        .unwrap_or(0);
    println!("Channels:");
    for (channel, speed) in &snapshot.overrides {
        println!("  {:<width$}  {}", channel.as_str(), speed_label(*speed));
    }
    Ok(())
}

pub async fn add(session: &Session, channel: &str, speed: SpeedPreset) -> Result<()> {
    let status = session.panel().await.add_override(channel, speed).await?;
    println!("{status}");
    Ok(())
}

pub async fn update(session: &Session, channel: &str, speed: SpeedPreset) -> Result<()> {
    let overrides = session
        .policy()
        .overrides()
        .await
        .with_context(|| store_error(session))?;
    if !overrides.contains(channel) {
        bail!("no override for channel {channel:?}; use `add` first");
    }
    let status = session
        .panel()
        .await
        .update_override(&ChannelName::new(channel), speed)
        .await?;
    println!("{status}");
    Ok(())
}

pub async fn remove(session: &Session, channel: &str) -> Result<()> {
    let status = session.panel().await.delete_override(channel).await?;
    println!("{status}");
    Ok(())
}

pub async fn set_default(session: &Session, speed: SpeedPreset) -> Result<()> {
    let status = session.panel().await.set_default(speed).await?;
    println!("{status}");
    Ok(())
}

pub async fn resolve(session: &Session, channel: &str) -> Result<()> {
    let policy = session
        .policy()
        .snapshot()
        .await
        .with_context(|| store_error(session))?;
    let channel = ChannelName::new(channel);
    let speed = policy.resolve(Some(&channel));
    let origin = if policy.overrides.contains(channel.as_str()) {
        "override"
    } else {
        "default"
    };
    println!("{channel}: {} ({origin})", speed_label(speed));
    Ok(())
}

pub fn check_url(session: &Session, url: &str) {
    let site = &session.config.site;
    if !site.is_watch_page(url) {
        println!("not a watch page");
        return;
    }
    match site.video_id(url) {
        Some(video) => println!("watch page (video {video})"),
        None => println!("watch page (no video id)"),
    }
}

/// Complete a simulated tab load and report what the page context did.
/// Delays are recorded rather than slept.
pub async fn simulate(
    session: &Session,
    url: &str,
    channel: Option<&str>,
    no_player: bool,
) -> Result<()> {
    let page = SimulatedPage::new(url);
    let page = Arc::new(if no_player { page } else { page.with_player() });
    if let Some(name) = channel {
        page.set_channel(name);
    }

    let clock = Arc::new(RecordingClock::new());
    let browser = Arc::new(SimulatedBrowser::with_config(
        Arc::clone(&session.store),
        Arc::clone(&clock),
        session.config.controller_config(),
    ));
    let tab = browser.open_tab(Arc::clone(&page));
    let mut reports = browser
        .controller(tab)
        .context("simulated tab closed unexpectedly")?
        .subscribe_reports();

    let relay = BackgroundRelay::new(
        Arc::clone(&browser),
        Arc::clone(&clock),
        session.config.site.clone(),
        session.config.timing,
    );
    match relay.on_tab_updated(tab, TabStatus::Complete, url).await {
        None => {
            println!("not a watch page; nothing to apply");
            return Ok(());
        }
        Some(Err(err)) => bail!("page context did not answer: {err}"),
        Some(Ok(_)) => {}
    }

    let report = reports
        .recv()
        .await
        .context("page context stopped before finishing")?;
    let waited = clock.total().as_millis();
    match report.outcome {
        RetryOutcome::Settled { attempts } => {
            let rate = page.playback_rate().unwrap_or(Speed::NORMAL.get());
            let channel = browser
                .controller(tab)
                .and_then(|controller| controller.current_channel())
                .map_or_else(|| "unknown channel".to_string(), |c| c.to_string());
            println!(
                "Applied {}x to {channel} after {attempts} attempt(s), waited {waited} ms",
                Speed::new(rate)
            );
        }
        RetryOutcome::Exhausted { attempts } => {
            println!("Gave up after {attempts} attempts, waited {waited} ms");
        }
    }
    Ok(())
}
