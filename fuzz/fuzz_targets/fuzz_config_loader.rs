#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and validation may reject input but must never panic.
    if let Ok(cfg) = focus_config::load_toml(data) {
        if cfg.validate().is_ok() {
            let _ = focus_core::StageCfg::from(&cfg.stage);
            let _ = focus_core::SearchCfg::from(&cfg.search);
            let _ = focus_core::ActuatorCfg::from((&cfg.stage, &cfg.motion));
        }
    }
});
