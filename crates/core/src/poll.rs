use std::fmt;
use std::rc::Rc;

use anyhow::{Context, Result};

use crate::actions::ButtonActions;
use crate::logger::Logger;
use crate::ocr::{is_dismiss, TextScanner};
use crate::routine::Routine;
use crate::sleep::Sleeper;
use crate::types::*;
use crate::window::WindowLocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    CheckingWindow,
    DismissingModal,
    Acting,
    Sleeping,
    Error,
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::CheckingWindow => "checking window",
            State::DismissingModal => "dismissing modal",
            State::Acting => "acting",
            State::Sleeping => "sleeping",
            State::Error => "error",
            State::Stopped => "stopped",
        })
    }
}

/// How one iteration ended, when it did not fail.
enum Outcome {
    Completed,
    /// Target window missing; nothing was done.
    Skipped,
}

/// The bot's main loop: check window, dismiss modal, click the routine's
/// buttons, sleep. Runs until stopped or too many consecutive failures.
pub struct PollLoop {
    routine: Routine,
    locator: WindowLocator,
    scanner: TextScanner,
    actions: ButtonActions,
    sleeper: Rc<dyn Sleeper>,
    stop: StopSignal,
    state: State,
    log: Logger,
}

impl PollLoop {
    pub fn new(
        routine: Routine,
        locator: WindowLocator,
        scanner: TextScanner,
        actions: ButtonActions,
        sleeper: Rc<dyn Sleeper>,
        stop: StopSignal,
        log: Logger,
    ) -> Self {
        Self {
            routine,
            locator,
            scanner,
            actions,
            sleeper,
            stop,
            state: State::CheckingWindow,
            log,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn enter(&mut self, state: State) {
        if self.state != state {
            self.log.debug(format!("{} -> {}", self.state, state));
            self.state = state;
        }
    }

    pub fn run(&mut self) -> LoopExit {
        self.log.info(format!("{} started", self.routine.name));
        let mut errors = 0u32;

        loop {
            if self.stop.is_set() {
                self.enter(State::Stopped);
                self.log.info(format!("{} stopped", self.routine.name));
                return LoopExit::Stopped;
            }

            match self.iterate() {
                Ok(Outcome::Completed) => errors = 0,
                Ok(Outcome::Skipped) => {}
                Err(e) => {
                    self.enter(State::Error);
                    errors += 1;
                    self.log.error(format!("iteration failed ({}/{}): {:#}", errors, self.routine.max_errors, e));
                    if errors >= self.routine.max_errors {
                        self.log.error(format!("too many errors ({}), giving up", errors));
                        return LoopExit::TooManyErrors;
                    }
                    self.enter(State::Sleeping);
                    self.sleeper.sleep(self.routine.backoff);
                }
            }
        }
    }

    fn iterate(&mut self) -> Result<Outcome> {
        self.enter(State::CheckingWindow);
        let Some(win) = self.check_window() else {
            self.log.warn(format!(
                "target window not found, retrying in {}s",
                self.routine.missing_wait.as_secs_f64()
            ));
            self.sleeper.sleep(self.routine.missing_wait);
            return Ok(Outcome::Skipped);
        };

        self.enter(State::DismissingModal);
        self.dismiss_modal(win.id)?;

        self.enter(State::Acting);
        for step in &self.routine.steps {
            if step.warn_on_miss {
                self.actions.click_button(&step.button, None, None)?;
            } else {
                self.actions.click_button_if_visible(&step.button, None)?;
            }
        }

        self.enter(State::Sleeping);
        self.sleeper.sleep(self.routine.interval);
        Ok(Outcome::Completed)
    }

    /// The target window, focused. Launches the client first when the
    /// routine allows it.
    fn check_window(&mut self) -> Option<WindowInfo> {
        let win = match self.locator.find_target_window() {
            Some(w) => w,
            None if self.routine.launch_if_missing => {
                if !self.locator.ensure_focused(true) {
                    return None;
                }
                return self.locator.find_target_window();
            }
            None => return None,
        };
        // Restores and maximizes the client each pass
        self.locator.focus(win.id, true);
        Some(win)
    }

    fn dismiss_modal(&mut self, id: WindowId) -> Result<bool> {
        let region = self.locator.get_region(id);
        let Some(p) = self.scanner.find_word(region, is_dismiss).context("modal scan failed")? else {
            return Ok(false);
        };
        self.actions.input().click(p.x, p.y)?;
        self.log.info(format!("dismissed modal at ({}, {})", p.x, p.y));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::{imageops, Rgba, RgbaImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::input::InputDriver;
    use crate::logger::{Level, Record};
    use crate::matcher::TemplateMatcher;
    use crate::settings::Settings;
    use crate::testing::*;

    const SECS_5: Duration = Duration::from_secs(5);

    struct Rig {
        platform: FakePlatform,
        screen: FakeScreen,
        input: RecordingInput,
        sleeper: Rc<RecordingSleeper>,
        records: std::sync::mpsc::Receiver<Record>,
        bot: PollLoop,
        dir: tempfile::TempDir,
    }

    fn client() -> WindowInfo {
        WindowInfo { id: 77, pid: 900, exe: r"C:\Roblox\RobloxPlayerBeta.exe".into(), title: "Roblox".into() }
    }

    fn ranked_button() -> RgbaImage {
        RgbaImage::from_fn(20, 12, |x, y| {
            let v = ((x * 11 + y * 17) % 180 + 60) as u8;
            Rgba([v, v, v, 255])
        })
    }

    /// Half black, half white: unlike anything on the fake desktop.
    fn other_button() -> RgbaImage {
        // Fine checkerboard, unlike anything else on the test desktop
        RgbaImage::from_fn(16, 10, |x, y| {
            let v = if (x / 2 + y / 2) % 2 == 0 { 0 } else { 255 };
            Rgba([v, v, v, 255])
        })
    }

    fn rig(routine: Routine, windows: Vec<WindowInfo>, words: Vec<Word>, sleeper: RecordingSleeper, stop: StopSignal) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.paths.buttons_dir = dir.path().to_path_buf();
        settings.detection.coarse_scale = 1;

        let (log, records) = Logger::capture();
        let platform = FakePlatform::new(windows);
        let screen = FakeScreen::new(RgbaImage::from_pixel(240, 180, Rgba([5, 5, 5, 255])));
        let input = RecordingInput::at(Point::new(0, 0));
        let sleeper = Rc::new(sleeper);

        let locator = WindowLocator::new(Box::new(platform.clone()), &settings.target, sleeper.clone(), log.clone()).unwrap();
        let scanner = TextScanner::new(Box::new(screen.clone()), Box::new(ScriptedRecognizer::new(words)), log.clone());
        let matcher = TemplateMatcher::new(Box::new(screen.clone()), &settings, log.clone());
        let driver = InputDriver::with_rng(
            Box::new(input.clone()),
            settings.input.clone(),
            StdRng::seed_from_u64(11),
            sleeper.clone(),
            log.clone(),
        );
        let actions = ButtonActions::new(matcher, driver, &settings, log.clone());
        let bot = PollLoop::new(routine, locator, scanner, actions, sleeper.clone(), stop, log);

        Rig { platform, screen, input, sleeper, records, bot, dir }
    }

    fn warnings(records: &std::sync::mpsc::Receiver<Record>) -> Vec<String> {
        records.try_iter().filter(|r| r.level == Level::Warn).map(|r| r.message).collect()
    }

    #[test]
    fn stop_before_start_does_nothing() {
        let stop = StopSignal::new();
        stop.trigger();
        let mut rig = rig(Routine::ranked(), vec![client()], vec![], RecordingSleeper::default(), stop);
        assert_eq!(rig.bot.run(), LoopExit::Stopped);
        assert_eq!(rig.bot.state(), State::Stopped);
        assert!(rig.screen.captures().is_empty());
        assert!(rig.sleeper.calls().is_empty());
    }

    #[test]
    fn missing_window_waits_and_does_nothing() {
        let stop = StopSignal::new();
        let sleeper = RecordingSleeper::stop_on(SECS_5, 3, &stop);
        let mut rig = rig(Routine::afk_reconnect(), vec![], vec![], sleeper, stop);

        assert_eq!(rig.bot.run(), LoopExit::Stopped);
        assert_eq!(rig.sleeper.calls(), vec![SECS_5; 3]);
        assert_eq!(warnings(&rig.records).len(), 3);
        assert!(rig.platform.launches().is_empty());
        assert!(rig.input.events().is_empty());
        assert!(rig.screen.captures().is_empty());
    }

    #[test]
    fn failing_iterations_trip_the_breaker() {
        let stop = StopSignal::new();
        let mut rig = rig(Routine::afk_reconnect(), vec![client()], vec![], RecordingSleeper::default(), stop);
        rig.screen.fail(true);

        assert_eq!(rig.bot.run(), LoopExit::TooManyErrors);
        assert_eq!(rig.screen.captures().len(), 5);
        assert_eq!(rig.sleeper.count(Routine::afk_reconnect().backoff), 4);
        assert_eq!(rig.bot.state(), State::Error);
    }

    #[test]
    fn success_resets_the_error_count() {
        let stop = StopSignal::new();
        let routine = Routine::afk_reconnect();
        let sleeper = RecordingSleeper::stop_on(routine.interval, 2, &stop);
        let mut rig = rig(routine.clone(), vec![client()], vec![], sleeper, stop);
        // Four failures, a clean pass, four more failures, a clean pass
        rig.screen.script(&[true, true, true, true, false, true, true, true, true, false]);

        assert_eq!(rig.bot.run(), LoopExit::Stopped);
        assert_eq!(rig.screen.captures().len(), 10);
        assert_eq!(rig.sleeper.count(routine.backoff), 8);
    }

    #[test]
    fn every_pass_refocuses_the_client_maximized() {
        let stop = StopSignal::new();
        let sleeper = RecordingSleeper::stop_on(Routine::afk_reconnect().interval, 3, &stop);
        let mut rig = rig(Routine::afk_reconnect(), vec![client()], vec![], sleeper, stop);

        assert_eq!(rig.bot.run(), LoopExit::Stopped);
        assert_eq!(rig.platform.focused(), vec![(77, true); 3]);
    }

    #[test]
    fn dismisses_modal_then_checks_reconnect() {
        let stop = StopSignal::new();
        let sleeper = RecordingSleeper::stop_on(Routine::afk_reconnect().interval, 1, &stop);
        let mut rig = rig(
            Routine::afk_reconnect(),
            vec![client()],
            vec![word("Dismiss", 10, 10, 50, 20)],
            sleeper,
            stop,
        );
        rig.platform.set_rect(77, Region::from_ltwh(100, 100, 120, 60));

        assert_eq!(rig.bot.run(), LoopExit::Stopped);
        assert_eq!(rig.input.clicks(), vec![Point::new(135, 120)]);
        assert_eq!(rig.platform.focused(), vec![(77, true)]);
        assert_eq!(rig.screen.captures(), vec![Some(Region::from_ltwh(100, 100, 120, 60))]);
        // Only the missing reconnect template is reported
        let warns = warnings(&rig.records);
        assert_eq!(warns.len(), 1);
        assert!(warns[0].contains("reconnect.png"));
    }

    #[test]
    fn ranked_clicks_visible_buttons_with_offsets() {
        let stop = StopSignal::new();
        let sleeper = RecordingSleeper::stop_on(Routine::ranked().interval, 1, &stop);
        let mut rig = rig(Routine::ranked(), vec![client()], vec![], sleeper, stop);
        ranked_button().save(rig.dir.path().join("ranked.png")).unwrap();
        other_button().save(rig.dir.path().join("fight.png")).unwrap();
        other_button().save(rig.dir.path().join("refresh.png")).unwrap();
        // Only the ranked button is on screen
        let mut desk = RgbaImage::from_pixel(240, 180, Rgba([5, 5, 5, 255]));
        imageops::replace(&mut desk, &ranked_button(), 150, 100);
        rig.screen.set_desktop(desk);
        rig.platform.set_rect(77, Region::from_ltwh(0, 0, 240, 180));

        assert_eq!(rig.bot.run(), LoopExit::Stopped);
        // Center (160, 106) shifted by (0, -15)
        assert_eq!(rig.input.clicks(), vec![Point::new(160, 91)]);
        let warns = warnings(&rig.records);
        assert_eq!(warns.len(), 2, "{:?}", warns);
        assert!(warns[0].contains("fight") && warns[1].contains("refresh"));
    }

    #[test]
    fn ranked_launches_missing_client() {
        let stop = StopSignal::new();
        let sleeper = RecordingSleeper::stop_on(Routine::ranked().interval, 1, &stop);
        let mut rig = rig(Routine::ranked(), vec![], vec![], sleeper, stop);
        rig.platform.appear_on_launch(client());

        assert_eq!(rig.bot.run(), LoopExit::Stopped);
        assert_eq!(rig.platform.launches(), vec!["RobloxPlayerBeta.exe".to_string()]);
        assert_eq!(rig.platform.focused(), vec![(77, true)]);
        assert_eq!(rig.sleeper.count(SECS_5), 1);
    }
}
