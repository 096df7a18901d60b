//! Startup banner and progress lines printed by `main`.

/// ```text
/// ╔══════════════════════════════════════════════════╗
/// ║              Care marketplace backend            ║
/// ╚══════════════════════════════════════════════════╝
/// ```
pub fn print_boxed_title(title: &str) {
    let border = "═".repeat(50);

    println!("╔{}╗", border);
    println!("║{:^50}║", title);
    println!("╚{}╝", border);
}

/// `→ Step 1: Connecting to MongoDB`
pub fn print_step_start(step: u8, description: &str) {
    println!("→ Step {}: {}", step, description);
}

/// `✓ Step 1: Collections indexed (8 items)`
pub fn print_step_complete(step: u8, description: &str, count: usize) {
    println!("✓ Step {}: {} ({} items)", step, description, count);
}

/// `   ├─ Stripe: ready`
pub fn print_sub_task(name: &str, status: &str) {
    println!("   ├─ {}: {}", name, status);
}

pub fn print_final_summary(repositories: usize, providers: usize, services: usize, address: &str) {
    println!();
    print_boxed_title("CARE MARKETPLACE READY");
    println!("   Repositories: {}", repositories);
    println!("   Providers:    {}", providers);
    println!("   Services:     {}", services);
    println!("   Listening on: http://{}", address);
    println!();
}
