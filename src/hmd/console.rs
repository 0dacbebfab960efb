/// Debug console commands
///
/// `parse_command` turns a line such as `stereo e=0.07 w2m=120` or
/// `hmd sp 150` into an `HmdCommand`; `HeadMountedDisplay::exec` runs it.

use glam::Vec3;
use thiserror::Error;

use super::HeadMountedDisplay;
use crate::constants::settings::{MAX_SCREEN_PERCENTAGE, MIN_SCREEN_PERCENTAGE};

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command")]
    Unknown,

    #[error("missing argument for {command}")]
    MissingArgument { command: &'static str },

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Value is out of range [30..300]")]
    OutOfRange,
}

/// On/off style argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
    Toggle,
}

impl Switch {
    fn apply(self, current: bool) -> bool {
        match self {
            Switch::On => true,
            Switch::Off => false,
            Switch::Toggle => !current,
        }
    }
}

/// `KEY=value` settings accepted after `STEREO`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StereoParam {
    Ipd(f32),
    FarClip(f32),
    NearClip(f32),
    WorldToMeters(f32),
    CameraScale(f32),
    PositionScale(f32),
    /// Degrees, honoured with dev settings on
    HorizontalFov(f32),
    VerticalFov(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HmdCommand {
    StereoOn,
    StereoOff,
    StereoHmd,
    StereoReset,
    StereoShow,
    StereoSet(Vec<StereoParam>),
    HmdEnable(bool),
    Vsync(Switch),
    VsyncReset,
    /// `None` resets to the runtime's ideal value
    ScreenPercentage(Option<f32>),
    UpdateOnRenderThread(Switch),
    PositionReset { yaw: f32 },
    PositionResetPosition,
    PositionResetRotation { yaw: f32 },
    PositionTracking(Switch),
    PositionEnforce(bool),
    PositionShow,
    DevSettings(bool),
    Version,
}

fn parse_switch(token: Option<&str>, allow_toggle: bool) -> Option<Switch> {
    match token.map(str::to_ascii_uppercase).as_deref() {
        Some("ON") | Some("1") | Some("ENABLE") => Some(Switch::On),
        Some("OFF") | Some("0") | Some("DISABLE") => Some(Switch::Off),
        Some("TOGGLE") | None if allow_toggle => Some(Switch::Toggle),
        _ => None,
    }
}

fn parse_f32(key: &str, value: &str) -> Result<f32, CommandError> {
    value.parse::<f32>().map_err(|_| CommandError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Optional yaw argument in degrees.
fn parse_yaw(token: Option<&str>) -> Result<f32, CommandError> {
    token.map_or(Ok(0.0), |value| parse_f32("yaw", value))
}

fn parse_stereo_params(tokens: &[&str]) -> Result<Vec<StereoParam>, CommandError> {
    let mut params = Vec::new();
    for token in tokens {
        let Some((key, value)) = token.split_once('=') else {
            return Err(CommandError::Unknown);
        };
        let key = key.to_ascii_uppercase();
        let value = parse_f32(&key, value)?;
        params.push(match key.as_str() {
            "E" => StereoParam::Ipd(value),
            "FCP" => StereoParam::FarClip(value),
            "NCP" => StereoParam::NearClip(value),
            "W2M" => StereoParam::WorldToMeters(value),
            "CS" => StereoParam::CameraScale(value),
            "PS" => StereoParam::PositionScale(value),
            "HFOV" => StereoParam::HorizontalFov(value),
            "VFOV" => StereoParam::VerticalFov(value),
            _ => return Err(CommandError::Unknown),
        });
    }
    Ok(params)
}

/// Parse one console line. Keywords are case-insensitive.
pub fn parse_command(line: &str) -> Result<HmdCommand, CommandError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((head, rest)) = tokens.split_first() else {
        return Err(CommandError::Unknown);
    };
    let sub = rest.first().map(|token| token.to_ascii_uppercase());
    let arg = rest.get(1).copied();

    match head.to_ascii_uppercase().as_str() {
        "STEREO" => match sub.as_deref() {
            Some("ON") => Ok(HmdCommand::StereoOn),
            Some("OFF") => Ok(HmdCommand::StereoOff),
            Some("HMD") => Ok(HmdCommand::StereoHmd),
            Some("RESET") => Ok(HmdCommand::StereoReset),
            Some("SHOW") => Ok(HmdCommand::StereoShow),
            _ => parse_stereo_params(rest).map(HmdCommand::StereoSet),
        },
        "HMD" => match sub.as_deref() {
            Some("ENABLE") => Ok(HmdCommand::HmdEnable(true)),
            Some("DISABLE") => Ok(HmdCommand::HmdEnable(false)),
            Some("VSYNC") => {
                if arg.map(str::to_ascii_uppercase).as_deref() == Some("RESET") {
                    Ok(HmdCommand::VsyncReset)
                } else {
                    parse_switch(arg, true)
                        .map(HmdCommand::Vsync)
                        .ok_or(CommandError::Unknown)
                }
            }
            Some("SP") | Some("SCREENPERCENTAGE") => {
                let value = arg.ok_or(CommandError::MissingArgument { command: "HMD SP" })?;
                if value.eq_ignore_ascii_case("RESET") {
                    return Ok(HmdCommand::ScreenPercentage(None));
                }
                let percentage = parse_f32("SP", value)?;
                if !(MIN_SCREEN_PERCENTAGE..=MAX_SCREEN_PERCENTAGE).contains(&percentage) {
                    return Err(CommandError::OutOfRange);
                }
                Ok(HmdCommand::ScreenPercentage(Some(percentage)))
            }
            Some("UPDATEONRT") => parse_switch(arg, true)
                .map(HmdCommand::UpdateOnRenderThread)
                .ok_or(CommandError::Unknown),
            _ => Err(CommandError::Unknown),
        },
        "HMDPOS" => match sub.as_deref() {
            Some("RESET") => Ok(HmdCommand::PositionReset { yaw: parse_yaw(arg)? }),
            Some("RESETPOS") => Ok(HmdCommand::PositionResetPosition),
            Some("RESETROT") => Ok(HmdCommand::PositionResetRotation { yaw: parse_yaw(arg)? }),
            Some("ON") | Some("ENABLE") => Ok(HmdCommand::PositionTracking(Switch::On)),
            Some("OFF") | Some("DISABLE") => Ok(HmdCommand::PositionTracking(Switch::Off)),
            Some("TOGGLE") => Ok(HmdCommand::PositionTracking(Switch::Toggle)),
            Some("ENFORCE") => match parse_switch(arg, false) {
                Some(Switch::On) => Ok(HmdCommand::PositionEnforce(true)),
                Some(Switch::Off) => Ok(HmdCommand::PositionEnforce(false)),
                _ => Err(CommandError::MissingArgument { command: "HMDPOS ENFORCE" }),
            },
            Some("SHOW") => Ok(HmdCommand::PositionShow),
            _ => Err(CommandError::Unknown),
        },
        "HMDDEV" => match sub.as_deref() {
            Some("ON") => Ok(HmdCommand::DevSettings(true)),
            Some("OFF") => Ok(HmdCommand::DevSettings(false)),
            _ => Err(CommandError::Unknown),
        },
        "HMDVERSION" => Ok(HmdCommand::Version),
        _ => Err(CommandError::Unknown),
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

impl HeadMountedDisplay {
    /// Run a console line. `None` when the line is not an HMD command.
    pub fn exec(&self, line: &str) -> Option<String> {
        match parse_command(line) {
            Ok(command) => Some(self.run_command(command)),
            Err(CommandError::Unknown) => None,
            Err(err) => Some(err.to_string()),
        }
    }

    /// Apply a parsed command, returning any text to echo back.
    pub fn run_command(&self, command: HmdCommand) -> String {
        log::debug!("[HMD] Console: {:?}", command);

        match command {
            HmdCommand::StereoOn | HmdCommand::StereoHmd => {
                let hmd_enabled = self.is_hmd_enabled();
                self.enforce_stereo();
                if !hmd_enabled {
                    return "HMD is disabled. Use 'hmd enable' to re-enable it.".to_string();
                }
            }
            HmdCommand::StereoOff => {
                let mut state = self.state.lock();
                state.flags.need_disable_stereo = true;
                state.settings.flags.stereo_enforced = true;
            }
            HmdCommand::StereoReset => {
                self.state.lock().settings.flags.stereo_enforced = false;
                self.reset_stereo_rendering_params();
            }
            HmdCommand::StereoShow => {
                let settings = self.settings();
                let (hfov, vfov) = settings.field_of_view_degrees();
                return format!(
                    "stereo ipd={:.4} hfov={:.3} vfov={:.3}\n nearPlane={:.4} farPlane={:.4}",
                    settings.interpupillary_distance,
                    hfov,
                    vfov,
                    settings.near_clipping_plane,
                    settings.far_clipping_plane
                );
            }
            HmdCommand::StereoSet(params) => self.apply_stereo_params(&params),
            HmdCommand::HmdEnable(enable) => self.enable_hmd(enable),
            HmdCommand::Vsync(switch) => {
                let mut state = self.state.lock();
                let vsync = switch.apply(state.settings.flags.vsync);
                state.settings.flags.vsync = vsync;
                state.settings.flags.override_vsync = true;
                state.flags.apply_system_overrides_on_stereo = true;
                if switch == Switch::Toggle {
                    return format!("VSync is currently {}", on_off(vsync));
                }
            }
            HmdCommand::VsyncReset => {
                let mut state = self.state.lock();
                if state.settings.flags.stereo_enabled {
                    state.settings.flags.vsync = state.settings.flags.saved_vsync;
                    state.flags.apply_system_overrides_on_stereo = true;
                }
                state.settings.flags.override_vsync = false;
            }
            HmdCommand::ScreenPercentage(percentage) => {
                self.set_screen_percentage(percentage.unwrap_or(0.0));
                self.state.lock().flags.apply_system_overrides_on_stereo = true;
            }
            HmdCommand::UpdateOnRenderThread(switch) => {
                let update_on_rt = self.update_settings(|settings| {
                    settings.flags.update_on_rt = switch.apply(settings.flags.update_on_rt);
                    settings.flags.update_on_rt
                });
                return format!("Update on render thread is currently {}", on_off(update_on_rt));
            }
            HmdCommand::PositionReset { yaw } => {
                self.set_head_tracking_enforced(false);
                self.reset_orientation_and_position(yaw);
            }
            HmdCommand::PositionResetPosition => {
                self.set_head_tracking_enforced(false);
                self.reset_position();
            }
            HmdCommand::PositionResetRotation { yaw } => {
                self.set_head_tracking_enforced(false);
                self.reset_orientation(yaw);
            }
            HmdCommand::PositionTracking(switch) => {
                self.update_settings(|settings| {
                    settings.flags.hmd_pos_tracking = switch.apply(settings.flags.hmd_pos_tracking);
                });
            }
            HmdCommand::PositionEnforce(enforce) => self.set_head_tracking_enforced(enforce),
            HmdCommand::PositionShow => {
                let enabled = self.settings().flags.hmd_pos_tracking;
                let vision = self
                    .current_frame()
                    .map_or(false, |frame| frame.flags().have_vision_tracking);
                return format!(
                    "hmdpos is {}, vision='{}'",
                    if enabled { "enabled" } else { "disabled" },
                    if vision { "active" } else { "lost" }
                );
            }
            HmdCommand::DevSettings(enable) => {
                let mut state = self.state.lock();
                state.settings.flags.dev_settings_enabled = enable;
                self.update_stereo_rendering_params(&mut state);
            }
            HmdCommand::Version => {
                let caps = self.capabilities();
                return format!(
                    "{}, runtime {}, crate {}",
                    caps.product_name,
                    caps.runtime_version,
                    env!("CARGO_PKG_VERSION")
                );
            }
        }
        String::new()
    }

    fn apply_stereo_params(&self, params: &[StereoParam]) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        for param in params {
            let settings = &mut state.settings;
            match *param {
                StereoParam::Ipd(ipd) => {
                    settings.interpupillary_distance = ipd;
                    settings.flags.override_ipd = true;
                    state.flags.need_update_stereo_rendering_params = true;
                }
                StereoParam::FarClip(far) => {
                    settings.far_clipping_plane = far;
                    settings.flags.clipping_planes_override = true;
                }
                StereoParam::NearClip(near) => {
                    settings.near_clipping_plane = near;
                    settings.flags.clipping_planes_override = true;
                }
                StereoParam::WorldToMeters(scale) => {
                    settings.world_to_meters_scale = scale;
                    settings.flags.world_to_meters_override = true;
                }
                StereoParam::CameraScale(scale) => {
                    settings.camera_scale = Vec3::splat(scale);
                    settings.flags.camera_scale_override = true;
                }
                StereoParam::PositionScale(scale) => settings.position_scale = Vec3::splat(scale),
                StereoParam::HorizontalFov(degrees) if settings.flags.dev_settings_enabled => {
                    settings.hfov = degrees.to_radians();
                    settings.flags.override_stereo = true;
                }
                StereoParam::VerticalFov(degrees) if settings.flags.dev_settings_enabled => {
                    settings.vfov = degrees.to_radians();
                    settings.flags.override_stereo = true;
                }
                StereoParam::HorizontalFov(_) | StereoParam::VerticalFov(_) => {
                    log::debug!("[HMD] FOV override needs HMDDEV ON");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HmdConfig;
    use crate::frame::WorldContext;
    use crate::runtime::MockRuntime;
    use std::sync::Arc;

    fn hmd() -> HeadMountedDisplay {
        HeadMountedDisplay::new(Arc::new(MockRuntime::new()), &HmdConfig::default())
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(parse_command("stereo on"), Ok(HmdCommand::StereoOn));
        assert_eq!(parse_command("HmdPos ResetRot 90"), Ok(HmdCommand::PositionResetRotation { yaw: 90.0 }));
        assert_eq!(parse_command("hmd vsync"), Ok(HmdCommand::Vsync(Switch::Toggle)));
    }

    #[test]
    fn test_parse_stereo_params() {
        assert_eq!(
            parse_command("STEREO E=0.07 W2M=120"),
            Ok(HmdCommand::StereoSet(vec![StereoParam::Ipd(0.07), StereoParam::WorldToMeters(120.0)]))
        );
        assert!(matches!(
            parse_command("STEREO E=abc"),
            Err(CommandError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_parse_screen_percentage() {
        assert_eq!(parse_command("HMD SP 150"), Ok(HmdCommand::ScreenPercentage(Some(150.0))));
        assert_eq!(parse_command("hmd sp reset"), Ok(HmdCommand::ScreenPercentage(None)));
        assert_eq!(parse_command("HMD SP 10"), Err(CommandError::OutOfRange));
        assert!(parse_command("HMD SP").is_err());
    }

    #[test]
    fn test_unknown_command_not_handled() {
        let hmd = hmd();
        assert!(hmd.exec("r.vsync 0").is_none());
        assert!(hmd.exec("").is_none());
        assert_eq!(hmd.exec("HMD SP 1000").as_deref(), Some("Value is out of range [30..300]"));
    }

    #[test]
    fn test_stereo_on_off() {
        let hmd = hmd();
        let world = WorldContext::default();

        hmd.exec("STEREO ON").unwrap();
        assert!(hmd.on_start_game_frame(&world));
        assert!(hmd.is_stereo_enabled());

        hmd.exec("STEREO OFF").unwrap();
        assert!(!hmd.on_start_game_frame(&world));
        assert!(!hmd.settings().flags.stereo_enabled);
    }

    #[test]
    fn test_stereo_params_and_reset() {
        let hmd = hmd();
        hmd.exec("stereo e=0.07 ncp=5 fcp=5000").unwrap();
        let settings = hmd.settings();
        assert_eq!(settings.interpupillary_distance, 0.07);
        assert_eq!(settings.near_clipping_plane, 5.0);
        assert!(settings.flags.clipping_planes_override);

        hmd.exec("stereo reset").unwrap();
        assert!(!hmd.settings().flags.clipping_planes_override);
        assert!(!hmd.settings().flags.override_ipd);
    }

    #[test]
    fn test_fov_needs_dev_settings() {
        let hmd = hmd();
        hmd.exec("stereo hfov=100").unwrap();
        assert!(!hmd.settings().flags.override_stereo);

        hmd.exec("hmddev on").unwrap();
        hmd.exec("stereo hfov=100").unwrap();
        assert!((hmd.settings().hfov.to_degrees() - 100.0).abs() < 1.0e-3);
    }

    #[test]
    fn test_update_on_rt_toggle_reports() {
        let hmd = hmd();
        assert_eq!(
            hmd.exec("HMD UPDATEONRT").as_deref(),
            Some("Update on render thread is currently OFF")
        );
        assert!(!hmd.settings().flags.update_on_rt);
    }

    #[test]
    fn test_hmdpos_show() {
        let hmd = hmd();
        hmd.exec("HMDPOS OFF").unwrap();
        assert_eq!(
            hmd.exec("HMDPOS SHOW").as_deref(),
            Some("hmdpos is disabled, vision='lost'")
        );
    }
}
