use stress_test::{stress_test_feed, stress_test_scaling};

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    let ok = rt.block_on(async_main());
    if !ok {
        std::process::exit(1);
    }
}

async fn async_main() -> bool {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            ASYNC STRESS TESTS                              ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut ok = true;

    // Small cluster, no artificial delay
    let stats = stress_test_feed(3, 50, 0, 7).await;
    stats.print();
    ok &= stats.converged;

    // Small cluster with jittered sends
    let stats = stress_test_feed(4, 100, 20, 42).await;
    stats.print();
    ok &= stats.converged;

    // Medium cluster with jittered sends
    let stats = stress_test_feed(8, 200, 10, 2024).await;
    stats.print();
    ok &= stats.converged;

    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS                                  ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    ok &= stress_test_scaling(12, 3).await;

    if ok {
        println!("\n✓ All stress tests completed successfully!");
    } else {
        println!("\n✗ Some replicas failed to converge");
    }
    ok
}
