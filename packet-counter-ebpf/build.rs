use which::which;

// Building this crate requires the `bpf-linker` binary on PATH; fail fast
// with a readable message instead of an opaque linker error.
fn main() {
    let bpf_linker = which("bpf-linker").expect("bpf-linker not found; install with `cargo install bpf-linker`");
    println!("cargo:rerun-if-changed={}", bpf_linker.to_str().expect("bpf-linker path is not UTF-8"));
}
