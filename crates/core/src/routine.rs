use std::time::Duration;

use crate::types::Step;

/// A bot variant: what to click each iteration and how to pace it.
#[derive(Debug, Clone)]
pub struct Routine {
    pub name: &'static str,
    /// Start the client when its window is missing.
    pub launch_if_missing: bool,
    pub steps: Vec<Step>,
    pub interval: Duration,
    pub backoff: Duration,
    pub missing_wait: Duration,
    /// Consecutive failed iterations before giving up.
    pub max_errors: u32,
}

fn step(button: &str, warn_on_miss: bool) -> Step {
    Step { button: button.to_string(), warn_on_miss }
}

impl Routine {
    /// Watches for the disconnect popup and clicks reconnect.
    pub fn afk_reconnect() -> Self {
        Self {
            name: "afk-monitor",
            launch_if_missing: false,
            steps: vec![step("reconnect", false)],
            interval: Duration::from_secs(2),
            backoff: Duration::from_secs(5),
            missing_wait: Duration::from_secs(5),
            max_errors: 5,
        }
    }

    /// Queues ranked matches.
    pub fn ranked() -> Self {
        Self {
            name: "ranked",
            launch_if_missing: true,
            steps: vec![step("fight", true), step("ranked", true), step("refresh", true)],
            interval: Duration::from_secs(1),
            backoff: Duration::from_secs(2),
            missing_wait: Duration::from_secs(5),
            max_errors: 5,
        }
    }

    pub fn button_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.button.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    #[test]
    fn stock_routines_only_use_configured_buttons() {
        let s = Settings::default();
        for r in [Routine::afk_reconnect(), Routine::ranked()] {
            assert!(s.validate(r.button_names()).is_ok(), "{}", r.name);
        }
        let ranked = Routine::ranked();
        let names: Vec<&str> = ranked.button_names().collect();
        assert_eq!(names, vec!["fight", "ranked", "refresh"]);
    }
}
