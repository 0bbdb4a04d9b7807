use std::io::BufRead;

use crate::error::{SolverError, SolverResult};
use crate::flux::SchemeName;
use crate::integrator::TimeStepAccuracy;
use crate::reconstruct::Interpolant;
use crate::timestep::TimeSteppingMethod;

/// Parsed, validated configuration (§6): one directive per non-blank,
/// non-`#` line, in the fixed order documented there. `~` is the sentinel
/// for "absent" on the optional file fields.
#[derive(Debug, Clone)]
pub struct Config {
    pub scheme_name: SchemeName,
    pub interpolant: Interpolant,
    pub cfl: f64,
    pub time_stepping_method: TimeSteppingMethod,
    pub global_time_step: Option<f64>,
    pub time_step_accuracy: TimeStepAccuracy,
    pub tolerance: f64,
    pub grid_file: String,
    pub ib_file: Option<String>,
    pub state_load_file: Option<String>,
    pub max_iters: usize,
    pub checkpoint_iter: usize,
    pub debug_level: u8,
    pub gamma: f64,
    pub r_gas: f64,
    pub rho_inf: f64,
    pub u_inf: f64,
    pub v_inf: f64,
    pub p_inf: f64,
    pub mu_ref: f64,
    pub t_ref: f64,
    pub sutherland_temp: f64,
    pub pr: f64,
}

/// Strips blank lines and `#`-comments, yielding only directive lines in
/// file order. The fixed ordering of §6 is part of the format contract, so
/// this reader is line-oriented rather than key-value — a key-value format
/// would under-specify which line is which directive.
struct DirectiveReader<I> {
    lines: I,
    lineno: usize,
}

impl<I: Iterator<Item = std::io::Result<String>>> DirectiveReader<I> {
    fn next_directive(&mut self) -> SolverResult<String> {
        loop {
            self.lineno += 1;
            match self.lines.next() {
                None => {
                    return Err(SolverError::config(
                        "config",
                        format!("unexpected end of file at line {}: expected another directive", self.lineno),
                    ))
                }
                Some(Err(e)) => {
                    return Err(SolverError::io("config", format!("error reading line {}: {e}", self.lineno)))
                }
                Some(Ok(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    return Ok(trimmed.to_string());
                }
            }
        }
    }
}

impl Config {
    pub fn parse<R: BufRead>(reader: R) -> SolverResult<Self> {
        let mut directives = DirectiveReader { lines: reader.lines(), lineno: 0 };

        let scheme_name_raw = directives.next_directive()?;
        let scheme_name = SchemeName::parse(&scheme_name_raw).ok_or_else(|| {
            SolverError::config("config", format!("unknown scheme_name '{scheme_name_raw}'"))
        })?;

        let interpolant_raw = directives.next_directive()?;
        let interpolant = Interpolant::parse(&interpolant_raw).ok_or_else(|| {
            SolverError::config("config", format!("unknown interpolant '{interpolant_raw}'"))
        })?;

        let cfl = parse_f64(&directives.next_directive()?, "cfl")?;

        let time_step_line = directives.next_directive()?;
        let mut time_step_tokens = time_step_line.split_whitespace();
        let method_code = time_step_tokens
            .next()
            .ok_or_else(|| SolverError::config("config", "missing time_stepping_method"))?;
        let time_stepping_method = TimeSteppingMethod::parse(method_code)?;
        let global_time_step = match time_step_tokens.next() {
            Some(tok) => Some(parse_f64(tok, "global_time_step")?),
            None => None,
        };

        let accuracy_raw = directives.next_directive()?;
        let time_step_accuracy = TimeStepAccuracy::parse(&accuracy_raw)?;

        let tolerance = parse_f64(&directives.next_directive()?, "tolerance")?;
        let grid_file = directives.next_directive()?;
        let ib_file = parse_optional_path(&directives.next_directive()?);
        let state_load_file = parse_optional_path(&directives.next_directive()?);
        let max_iters = parse_usize(&directives.next_directive()?, "max_iters")?;
        let checkpoint_iter = parse_usize(&directives.next_directive()?, "checkpoint_iter")?;
        let debug_level = parse_usize(&directives.next_directive()?, "debug_level")? as u8;
        let gamma = parse_f64(&directives.next_directive()?, "gamma")?;
        let r_gas = parse_f64(&directives.next_directive()?, "R")?;
        let rho_inf = parse_f64(&directives.next_directive()?, "rho_inf")?;
        let u_inf = parse_f64(&directives.next_directive()?, "u_inf")?;
        let v_inf = parse_f64(&directives.next_directive()?, "v_inf")?;
        let p_inf = parse_f64(&directives.next_directive()?, "p_inf")?;
        let mu_ref = parse_f64(&directives.next_directive()?, "mu_ref")?;
        let t_ref = parse_f64(&directives.next_directive()?, "T_ref")?;
        let sutherland_temp = parse_f64(&directives.next_directive()?, "Sutherland_temp")?;
        let pr = parse_f64(&directives.next_directive()?, "Pr")?;

        let config = Config {
            scheme_name,
            interpolant,
            cfl,
            time_stepping_method,
            global_time_step,
            time_step_accuracy,
            tolerance,
            grid_file,
            ib_file,
            state_load_file,
            max_iters,
            checkpoint_iter,
            debug_level,
            gamma,
            r_gas,
            rho_inf,
            u_inf,
            v_inf,
            p_inf,
            mu_ref,
            t_ref,
            sutherland_temp,
            pr,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> SolverResult<()> {
        if self.cfl <= 0.0 {
            return Err(SolverError::config("config", format!("cfl must be > 0, got {}", self.cfl)));
        }
        if self.tolerance <= 0.0 {
            return Err(SolverError::config("config", format!("tolerance must be > 0, got {}", self.tolerance)));
        }
        if self.gamma <= 1.0 {
            return Err(SolverError::config("config", format!("gamma must be > 1, got {}", self.gamma)));
        }
        if self.rho_inf <= 0.0 || self.p_inf <= 0.0 {
            return Err(SolverError::config(
                "config",
                format!("rho_inf and p_inf must be > 0, got rho_inf={}, p_inf={}", self.rho_inf, self.p_inf),
            ));
        }
        if self.max_iters == 0 {
            return Err(SolverError::config("config", "max_iters must be >= 1"));
        }
        Ok(())
    }
}

fn parse_optional_path(raw: &str) -> Option<String> {
    if raw == "~" {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_f64(raw: &str, field: &str) -> SolverResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| SolverError::config("config", format!("invalid {field} '{raw}': {e}")))
}

fn parse_usize(raw: &str, field: &str) -> SolverResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| SolverError::config("config", format!("invalid {field} '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_config() -> &'static str {
        "van_leer\n\
         none\n\
         0.5\n\
         l\n\
         none\n\
         1e-6\n\
         grid.txt\n\
         ~\n\
         ~\n\
         1000\n\
         100\n\
         0\n\
         1.4\n\
         287.0\n\
         1.225\n\
         100.0\n\
         0.0\n\
         101325.0\n\
         0.0\n\
         288.15\n\
         110.4\n\
         0.72\n"
    }

    #[test]
    fn parses_well_formed_config() {
        let config = Config::parse(Cursor::new(sample_config())).unwrap();
        assert_eq!(config.scheme_name, SchemeName::VanLeer);
        assert_eq!(config.interpolant, Interpolant::None);
        assert_eq!(config.time_stepping_method, TimeSteppingMethod::Local);
        assert_eq!(config.ib_file, None);
        assert_eq!(config.state_load_file, None);
        assert_eq!(config.max_iters, 1000);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = format!("# a comment\n\n{}", sample_config());
        let config = Config::parse(Cursor::new(text)).unwrap();
        assert_eq!(config.max_iters, 1000);
    }

    #[test]
    fn unknown_scheme_name_is_rejected() {
        let text = sample_config().replacen("van_leer", "bogus_scheme", 1);
        let err = Config::parse(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, SolverError::Config { .. }));
    }

    #[test]
    fn global_time_step_override_is_parsed_when_present() {
        let text = sample_config().replacen("l\n", "g 0.002\n", 1);
        let config = Config::parse(Cursor::new(text)).unwrap();
        assert_eq!(config.time_stepping_method, TimeSteppingMethod::Global);
        assert_eq!(config.global_time_step, Some(0.002));
    }
}
