//! Build information embedded by `build.rs`

use std::fmt;

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    /// Short commit hash, `unknown` outside a git checkout
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    git_dirty: &'static str,
    pub build_timestamp: &'static str,
    pub target: &'static str,
    pub host: &'static str,
    pub profile: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("PARALLELIZER_GIT_HASH"),
            git_branch: env!("PARALLELIZER_GIT_BRANCH"),
            git_dirty: env!("PARALLELIZER_GIT_DIRTY"),
            build_timestamp: env!("PARALLELIZER_BUILD_TIMESTAMP"),
            target: env!("PARALLELIZER_TARGET"),
            host: env!("PARALLELIZER_HOST"),
            profile: env!("PARALLELIZER_PROFILE"),
            rustc_version: env!("PARALLELIZER_RUSTC_VERSION"),
        }
    }

    pub fn git_dirty(&self) -> bool {
        self.git_dirty == "true"
    }

    /// `0.1.0-abc1234`, with `-dirty` appended for uncommitted builds
    pub fn full_version(&self) -> String {
        let dirty = if self.git_dirty() { "-dirty" } else { "" };
        format!("{}-{}{}", self.version, self.git_hash, dirty)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f)?;
        writeln!(f, "  Commit:   {} ({})", self.git_hash, self.git_branch)?;
        writeln!(f, "  Built:    {} [{}]", self.build_timestamp, self.profile)?;
        writeln!(f, "  Target:   {}", self.target)?;
        writeln!(f, "  Host:     {}", self.host)?;
        writeln!(f, "  Compiler: {}", self.rustc_version)?;
        writeln!(f, "  CPUs:     {}", num_cpus::get())?;
        Ok(())
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo::current()
}

pub fn print_version() {
    print!("{}", build_info());
}
