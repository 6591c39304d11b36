use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Result};

use crate::actions::ButtonActions;
use crate::input::InputDriver;
use crate::logger::Logger;
use crate::matcher::TemplateMatcher;
use crate::ocr::{configure_tesseract, TesseractRecognizer, TextRecognizer, TextScanner};
use crate::platform::stub::StubRecognizer;
use crate::platform::{create_platform, hotkey};
use crate::poll::PollLoop;
use crate::routine::Routine;
use crate::settings::Settings;
use crate::sleep::{Sleeper, ThreadSleeper};
use crate::types::{LoopExit, StopSignal};
use crate::window::WindowLocator;

pub const SETTINGS_FILE: &str = "tapper.json";

/// Entry point shared by the binaries. `--stub` swaps every OS backend for
/// a logged dry run.
pub fn run(routine: Routine) -> Result<()> {
    let force_stub = std::env::args().any(|a| a == "--stub");

    let (settings, load_error) = match Settings::load(Path::new(SETTINGS_FILE)) {
        Ok(s) => (s, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    let log = match Logger::init(&settings.paths.logs_dir, settings.log_level) {
        Ok(log) => log,
        Err(e) => {
            let log = Logger::stderr(settings.log_level);
            log.warn(format!("{:#}, logging to stderr only", e));
            log
        }
    };
    if let Some(e) = load_error {
        log.error(format!("failed to load {}: {:#}, using defaults", SETTINGS_FILE, e));
    } else if !Path::new(SETTINGS_FILE).exists() {
        match settings.save(Path::new(SETTINGS_FILE)) {
            Ok(()) => log.info(format!("wrote default settings to {}", SETTINGS_FILE)),
            Err(e) => log.warn(format!("failed to write {}: {:#}", SETTINGS_FILE, e)),
        }
    }

    settings.validate(routine.button_names())?;
    log.info(format!("starting {}{}", routine.name, if force_stub { " (stub)" } else { "" }));

    let recognizer: Box<dyn TextRecognizer> = if force_stub {
        Box::new(StubRecognizer)
    } else {
        configure_tesseract(&settings.paths.tesseract, &log);
        Box::new(TesseractRecognizer::new(&settings.detection.ocr_lang))
    };

    let backends = create_platform(force_stub, &log)?;
    let sleeper: Rc<dyn Sleeper> = Rc::new(ThreadSleeper);

    let locator = WindowLocator::new(
        backends.platform,
        &settings.target,
        sleeper.clone(),
        log.with_prefix("window"),
    )?;
    let scanner = TextScanner::new(Box::new(backends.screen.clone()), recognizer, log.with_prefix("ocr"));
    let matcher = TemplateMatcher::new(Box::new(backends.screen), &settings, log.with_prefix("matcher"));
    let input = InputDriver::new(backends.input, settings.input.clone(), sleeper.clone(), log.with_prefix("input"));
    let actions = ButtonActions::new(matcher, input, &settings, log.with_prefix("actions"));

    let stop = StopSignal::new();
    hotkey::start_stop_listener(&stop, &log);
    log.info(format!("press {} to stop", hotkey::STOP_CHORD));

    if !locator.ensure_focused(true) {
        bail!("cannot start: target window not found");
    }

    let name = routine.name;
    let mut bot = PollLoop::new(routine, locator, scanner, actions, sleeper, stop, log.with_prefix(name));
    match bot.run() {
        LoopExit::Stopped => {
            log.info(format!("{} exited", name));
            Ok(())
        }
        LoopExit::TooManyErrors => bail!("{} stopped after repeated errors", name),
    }
}
