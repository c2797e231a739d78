//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

const DEFAULT_TARGET: &str = "vmlinux";

#[derive(Parser, Debug)]
#[command(
    name = "kfaddr",
    version,
    about = "Resolve kernel function+offset/length addresses to source lines",
    after_help = "\
EXAMPLES:
    kfaddr vmlinux schedule+0x1a/0x80                 Resolve against vmlinux
    kfaddr -e foo.ko foo_xmit+0x44/0x120              Resolve inside a module
    CROSS_COMPILE=aarch64-linux-gnu- kfaddr vmlinux do_idle+0x1c8

ENVIRONMENT:
    CROSS_COMPILE    Prefix for addr2line (e.g. aarch64-linux-gnu-)
    LLVM             Use llvm-addr2line (LLVM=1, LLVM=/path/to/bin/, LLVM=-17)"
)]
pub struct Args {
    /// Kernel image or module to resolve against (default: vmlinux)
    #[arg(value_name = "TARGET")]
    pub target: Option<PathBuf>,

    /// Addresses in the form func+0xOFFSET[/0xLENGTH]
    #[arg(value_name = "ADDRESSES")]
    pub addresses: Vec<String>,

    /// Kernel image or module (takes precedence over TARGET)
    #[arg(short = 'e', long = "exe", value_name = "FILE")]
    pub exe: Option<PathBuf>,

    /// Strip directory names from source paths
    #[arg(short = 's', long)]
    pub basenames: bool,

    /// Alternate source path prefix to strip (repeatable)
    #[arg(long = "path-prefix", value_name = "PREFIX")]
    pub path_prefixes: Vec<String>,

    /// Module source root (repeatable)
    #[arg(long = "module-srcs", value_name = "DIR")]
    pub module_srcs: Vec<PathBuf>,

    /// Kernel source root; skips detection via start_kernel
    #[arg(long = "kernel-src", value_name = "DIR")]
    pub kernel_src: Option<PathBuf>,

    /// Show function names (always on, kept for faddr2line compatibility)
    #[arg(short = 'f', long = "functions")]
    pub functions: bool,

    /// Show inlined frames (always on, kept for faddr2line compatibility)
    #[arg(short = 'i', long = "inlines")]
    pub inlines: bool,

    /// Human-readable output (always on, kept for faddr2line compatibility)
    #[arg(short = 'p', long = "pretty-print")]
    pub pretty_print: bool,

    /// Demangle names (accepted for addr2line compatibility)
    #[arg(short = 'C', long = "demangle")]
    pub demangle: bool,

    /// Enable verbose diagnostic logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// The target object and the address specs to resolve
    ///
    /// With `-e`, the first positional argument is an address, not a target.
    #[must_use]
    pub fn target_and_specs(&self) -> (PathBuf, Vec<String>) {
        match &self.exe {
            Some(exe) => {
                let specs = self
                    .target
                    .iter()
                    .map(|t| t.to_string_lossy().into_owned())
                    .chain(self.addresses.iter().cloned())
                    .collect();
                (exe.clone(), specs)
            }
            None => (
                self.target.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET)),
                self.addresses.clone(),
            ),
        }
    }
}
