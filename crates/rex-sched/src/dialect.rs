//! Scheduler dialects: per-scheduler job script rendering and submission
//! commands. Dialect differences stay behind a small trait so the
//! submission path never branches on scheduler names.

use std::path::PathBuf;

use rex_core::{ErrorInfo, RexError};
use serde::{Deserialize, Serialize};

/// Resource directives requested for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResources {
    /// CPU cores per job.
    pub cpus: u32,
    /// GPUs per job; zero omits the GPU directives entirely.
    pub gpus: u32,
    /// GPU model requested when `gpus` is non-zero.
    pub gpu_type: String,
    /// Memory per node in gigabytes.
    pub memory_gb: u32,
    /// Walltime in the scheduler's `H:M:S` form.
    pub walltime: String,
    /// Queue (Univa) or partition (Slurm) to submit into.
    #[serde(default)]
    pub partition: Option<String>,
}

impl Default for JobResources {
    fn default() -> Self {
        Self {
            cpus: 4,
            gpus: 0,
            gpu_type: "K80".to_string(),
            memory_gb: 16,
            walltime: "24:0:0".to_string(),
            partition: None,
        }
    }
}

/// Everything a dialect needs to render one job script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Stand-alone command reproducing the run (worker re-invocation).
    pub run_command: String,
    /// Resource directives.
    pub resources: JobResources,
    /// Environment setup lines inserted before the run command.
    pub setup_lines: Vec<String>,
    /// File capturing the job's stdout.
    pub output_path: PathBuf,
    /// File capturing the job's stderr.
    pub error_path: PathBuf,
}

/// A scheduler dialect: how to write a job script and whom to hand it to.
pub trait SchedulerDialect {
    /// Dialect name as selected by configuration.
    fn name(&self) -> &'static str;

    /// Renders the full job script text for the request.
    fn render_script(&self, request: &JobRequest) -> String;

    /// Submission program invoked with the script path as sole argument.
    fn submit_program(&self) -> &str;

    /// File name of the script inside the run workspace.
    fn script_file_name(&self) -> &'static str {
        "job_script.sh"
    }

    /// Extracts the scheduler job id from submission stdout, when present.
    fn parse_job_id(&self, stdout: &str) -> Option<String> {
        stdout.split_whitespace().next().map(str::to_string)
    }
}

impl std::fmt::Debug for dyn SchedulerDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerDialect")
            .field("name", &self.name())
            .finish()
    }
}

/// SLURM dialect (`sbatch` + `#SBATCH` directives).
#[derive(Debug, Clone)]
pub struct Slurm {
    submit_program: String,
}

impl Default for Slurm {
    fn default() -> Self {
        Self {
            submit_program: "sbatch".to_string(),
        }
    }
}

impl Slurm {
    /// Overrides the submission program (tests point this at a stub).
    pub fn with_submit_program(program: impl Into<String>) -> Self {
        Self {
            submit_program: program.into(),
        }
    }
}

impl SchedulerDialect for Slurm {
    fn name(&self) -> &'static str {
        "slurm"
    }

    fn render_script(&self, request: &JobRequest) -> String {
        let res = &request.resources;
        let mut script = String::from("#!/bin/bash\n");
        script.push_str(&format!("#SBATCH --ntasks={}\n", res.cpus));
        script.push_str(&format!("#SBATCH --mem={}gb\n", res.memory_gb));
        script.push_str(&format!("#SBATCH --time={}\n", res.walltime));
        script.push_str(&format!(
            "#SBATCH --output={}\n",
            request.output_path.display()
        ));
        script.push_str(&format!("#SBATCH --error={}\n", request.error_path.display()));
        if let Some(partition) = &res.partition {
            script.push_str(&format!("#SBATCH --partition={partition}\n"));
        }
        if res.gpus > 0 {
            script.push_str(&format!("#SBATCH --gres=gpu:{}:{}\n", res.gpu_type, res.gpus));
        }
        for line in &request.setup_lines {
            script.push_str(line);
            script.push('\n');
        }
        script.push_str(&request.run_command);
        script.push('\n');
        script
    }

    fn submit_program(&self) -> &str {
        &self.submit_program
    }

    fn parse_job_id(&self, stdout: &str) -> Option<String> {
        // sbatch prints "Submitted batch job <id>".
        stdout.split_whitespace().last().map(str::to_string)
    }
}

/// Univa/PBS-style dialect (`qsub` + `#PBS` directives).
#[derive(Debug, Clone)]
pub struct Univa {
    submit_program: String,
}

impl Default for Univa {
    fn default() -> Self {
        Self {
            submit_program: "qsub".to_string(),
        }
    }
}

impl Univa {
    /// Overrides the submission program (tests point this at a stub).
    pub fn with_submit_program(program: impl Into<String>) -> Self {
        Self {
            submit_program: program.into(),
        }
    }
}

impl SchedulerDialect for Univa {
    fn name(&self) -> &'static str {
        "univa"
    }

    fn render_script(&self, request: &JobRequest) -> String {
        let res = &request.resources;
        let mut selection = format!("#PBS -lselect=1:ncpus={}:mem={}gb", res.cpus, res.memory_gb);
        if res.gpus > 0 {
            selection.push_str(&format!(":ngpus={}:gpu_type={}", res.gpus, res.gpu_type));
        }
        let mut script = String::new();
        script.push_str(&selection);
        script.push('\n');
        script.push_str(&format!("#PBS -lwalltime={}\n", res.walltime));
        script.push_str(&format!("#PBS -e {}\n", request.error_path.display()));
        script.push_str(&format!("#PBS -o {}\n", request.output_path.display()));
        if let Some(queue) = &res.partition {
            script.push_str(&format!("#PBS -q {queue}\n"));
        }
        for line in &request.setup_lines {
            script.push_str(line);
            script.push('\n');
        }
        // Jobs start in the submission directory, not the script's.
        script.push_str("cd $PBS_O_WORKDIR\n");
        script.push_str(&request.run_command);
        script.push('\n');
        script
    }

    fn submit_program(&self) -> &str {
        &self.submit_program
    }

    fn parse_job_id(&self, stdout: &str) -> Option<String> {
        // qsub prints "Your job <id> (...)" or a bare job id.
        let tokens: Vec<&str> = stdout.split_whitespace().collect();
        match tokens.as_slice() {
            ["Your", "job", id, ..] => Some((*id).to_string()),
            [id, ..] => Some((*id).to_string()),
            [] => None,
        }
    }
}

/// Resolves a dialect by configured name.
pub fn dialect_for(name: &str) -> Result<Box<dyn SchedulerDialect>, RexError> {
    match name {
        "slurm" => Ok(Box::new(Slurm::default())),
        "univa" => Ok(Box::new(Univa::default())),
        other => Err(RexError::Submission(
            ErrorInfo::new("scheduler-unknown", format!("unknown scheduler dialect '{other}'"))
                .with_hint("supported dialects: slurm, univa"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JobRequest {
        JobRequest {
            run_command: "rex exec-one --workspace /tmp/ws --runner shell --methods train"
                .to_string(),
            resources: JobResources {
                cpus: 8,
                gpus: 2,
                gpu_type: "A100".to_string(),
                memory_gb: 32,
                walltime: "12:0:0".to_string(),
                partition: Some("gpu".to_string()),
            },
            setup_lines: vec!["source env/bin/activate".to_string()],
            output_path: PathBuf::from("/tmp/ws/logs/output.log"),
            error_path: PathBuf::from("/tmp/ws/logs/error.log"),
        }
    }

    #[test]
    fn slurm_script_carries_all_directives() {
        let script = Slurm::default().render_script(&request());
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("#SBATCH --ntasks=8"));
        assert!(script.contains("#SBATCH --mem=32gb"));
        assert!(script.contains("#SBATCH --time=12:0:0"));
        assert!(script.contains("#SBATCH --partition=gpu"));
        assert!(script.contains("#SBATCH --gres=gpu:A100:2"));
        assert!(script.contains("source env/bin/activate\n"));
        assert!(script.ends_with("--methods train\n"));
    }

    #[test]
    fn univa_script_selects_resources_in_one_line() {
        let script = Univa::default().render_script(&request());
        assert!(script.contains("#PBS -lselect=1:ncpus=8:mem=32gb:ngpus=2:gpu_type=A100"));
        assert!(script.contains("#PBS -lwalltime=12:0:0"));
        assert!(script.contains("#PBS -q gpu"));
        assert!(script.contains("cd $PBS_O_WORKDIR\n"));
    }

    #[test]
    fn gpu_directives_are_omitted_without_gpus() {
        let mut req = request();
        req.resources.gpus = 0;
        assert!(!Slurm::default().render_script(&req).contains("--gres"));
        assert!(!Univa::default().render_script(&req).contains("ngpus"));
    }

    #[test]
    fn job_id_parsing_per_dialect() {
        assert_eq!(
            Slurm::default().parse_job_id("Submitted batch job 4242\n"),
            Some("4242".to_string())
        );
        assert_eq!(
            Univa::default().parse_job_id("Your job 99 (\"job_script.sh\") has been submitted\n"),
            Some("99".to_string())
        );
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        let err = dialect_for("lsf").unwrap_err();
        assert_eq!(err.info().code, "scheduler-unknown");
    }
}
