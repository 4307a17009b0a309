use anyhow::{Result, anyhow};
use attsim::{MachineState, OpSize, Register, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::tracer::{LineAction, LineActions};

/// Configuration for a batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Lines to stop at before they are evaluated
    #[serde(default)]
    pub breakpoints: Vec<usize>,

    /// Stack configuration
    #[serde(default)]
    pub stack: StackConfig,

    /// Initial register values (register name -> value)
    #[serde(default, with = "register_map")]
    pub registers: BTreeMap<Register, u64>,

    /// Line actions (skip, etc.) by line number
    #[serde(default, with = "line_actions_map")]
    pub line_actions: LineActions,

    /// Run bounds
    #[serde(default)]
    pub run: RunConfig,
}

/// Stack configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Initial %rsp (hex string like "0x7fff_f000_0000")
    #[serde(default = "StackConfig::default_stack_base", with = "hex_string")]
    pub base_address: u64,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            base_address: Self::default_stack_base(),
        }
    }
}

impl StackConfig {
    fn default_stack_base() -> u64 {
        attsim::DEFAULT_STACK_BASE
    }
}

/// Line action configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineActionConfig {
    Skip,
}

impl From<LineActionConfig> for LineAction {
    fn from(config: LineActionConfig) -> Self {
        match config {
            LineActionConfig::Skip => LineAction::Skip,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Lines evaluated per bounded run
    #[serde(default = "RunConfig::default_steps_per_run")]
    pub steps_per_run: usize,

    /// Bounded runs before giving up on a program that does not finish
    #[serde(default = "RunConfig::default_max_runs")]
    pub max_runs: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            steps_per_run: Self::default_steps_per_run(),
            max_runs: Self::default_max_runs(),
        }
    }
}

impl RunConfig {
    fn default_steps_per_run() -> usize {
        attsim::DEFAULT_MAX_STEPS_PER_RUN
    }

    fn default_max_runs() -> usize {
        100
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path.as_ref(), e))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path.as_ref(), e))?;

        if config.run.steps_per_run == 0 {
            return Err(anyhow!("run.steps_per_run must be at least 1"));
        }
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        fs::write(&path, contents)
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path.as_ref(), e))?;

        Ok(())
    }

    /// Create a sample configuration file
    pub fn create_sample() -> Self {
        let mut registers = BTreeMap::new();
        registers.insert(Register::RDI, 0x2a);
        registers.insert(Register::RSI, 0x10);

        let mut line_actions = BTreeMap::new();
        line_actions.insert(3, vec![LineAction::Skip]);

        Config {
            breakpoints: vec![5],
            stack: StackConfig::default(),
            registers,
            line_actions,
            run: RunConfig::default(),
        }
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            max_steps_per_run: self.run.steps_per_run,
            stack_base: self.stack.base_address,
        }
    }

    /// Zeroed machine with `%rsp` at the stack base and the configured
    /// registers applied on top.
    pub fn initial_state(&self) -> MachineState {
        self.registers.iter().fold(
            MachineState::new(self.stack.base_address),
            |state, (&reg, &value)| state.with_register(reg, value),
        )
    }
}

/// Hex value such as `0x7fff_f000_0000`; the `0x` prefix and underscores
/// are optional
fn parse_hex(text: &str) -> Result<u64> {
    let body = text.trim();
    let body = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .unwrap_or(body);
    let digits: String = body
        .chars()
        .filter(|&c| c != '_')
        .collect();
    if digits.is_empty() {
        return Err(anyhow!("Empty hex value '{}'", text));
    }
    u64::from_str_radix(&digits, 16).map_err(|e| anyhow!("Bad hex value '{}': {}", text, e))
}

/// Parse a 64-bit register name, with or without the `%` sigil
fn parse_register_name(name: &str) -> Result<Register> {
    let bare = name.strip_prefix('%').unwrap_or(name);
    match Register::from_name(bare) {
        Some(reg) if reg.size() == OpSize::Quad => Ok(reg),
        Some(reg) => Err(anyhow!(
            "Only 64-bit registers can be seeded, use {} instead of {}",
            reg.parent_64(),
            reg
        )),
        None => Err(anyhow!("Unknown register name: {}", name)),
    }
}


/// Addresses as `"0x..."` strings, since TOML integers stop at `i64::MAX`
mod hex_string {
    use super::parse_hex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_hex(&text).map_err(serde::de::Error::custom)
    }

    pub fn serialize<S: Serializer>(address: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", address))
    }
}

/// `[registers]` table: 64-bit register names mapped to hex values
mod register_map {
    use super::{parse_hex, parse_register_name};
    use attsim::Register;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<Register, u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(name, value)| -> anyhow::Result<(Register, u64)> {
                Ok((parse_register_name(&name)?, parse_hex(&value)?))
            })
            .collect::<anyhow::Result<BTreeMap<_, _>>>()
            .map_err(serde::de::Error::custom)
    }

    pub fn serialize<S>(seeds: &BTreeMap<Register, u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        seeds
            .iter()
            .map(|(reg, value)| (reg.name(), format!("{:#x}", value)))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }
}

/// Custom deserializer for line actions map
mod line_actions_map {
    use super::{LineAction, LineActionConfig};
    use crate::tracer::LineActions;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<LineActions, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string_map: BTreeMap<String, Vec<LineActionConfig>> =
            BTreeMap::deserialize(deserializer)?;
        let mut actions = BTreeMap::new();

        for (line_str, config_actions) in string_map {
            let line: usize = line_str.parse().map_err(|e| {
                serde::de::Error::custom(format!("Invalid line number '{}': {}", line_str, e))
            })?;

            let runtime_actions: Vec<LineAction> = config_actions
                .into_iter()
                .map(|config| config.into())
                .collect();

            if !runtime_actions.is_empty() {
                actions.insert(line, runtime_actions);
            }
        }

        Ok(actions)
    }

    pub fn serialize<S>(map: &LineActions, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let toml_map: BTreeMap<String, Vec<BTreeMap<String, String>>> = map
            .iter()
            .map(|(line, actions)| {
                let action_objects: Vec<BTreeMap<String, String>> = actions
                    .iter()
                    .map(|action| {
                        let mut obj = BTreeMap::new();
                        obj.insert(
                            "type".to_string(),
                            match action {
                                LineAction::Skip => "skip".to_string(),
                            },
                        );
                        obj
                    })
                    .collect();
                (line.to_string(), action_objects)
            })
            .collect();

        toml_map.serialize(serializer)
    }
}
