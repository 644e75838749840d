use criterion::{black_box, criterion_group, criterion_main, Criterion};
use heatgrid::{EngineConfig, GridCoordinates, Method, ParallelInterpolationEngine, SamplePoint, SampleSet};

fn survey(n: usize) -> SampleSet
{
    (0..n).map(|i|
    {
        let t = i as f64;
        let x = (t * 7.31) % 40.0;
        let y = (t * 3.17) % 25.0;
        SamplePoint::new(x, y, 50.0 + 40.0 * (x * 0.2).sin() * (y * 0.15).cos())
    }).collect()
}

fn run_methods(c: &mut Criterion)
{
    let samples = survey(120);
    let grid = GridCoordinates::linspace((0.0, 40.0), (0.0, 25.0), 150, 94);
    for method in [Method::Idw, Method::Rbf, Method::Kriging]
    {
        c.bench_function(&format!("{method} 150x94"), |b|
        {
            let mut engine = ParallelInterpolationEngine::new(EngineConfig::default()).unwrap();
            b.iter(||
            {
                engine.clear_cache();
                black_box(engine.interpolate(&samples, &grid, method, 0.1))
            })
        });
    }
}

fn run_cached(c: &mut Criterion)
{
    let samples = survey(120);
    let grid = GridCoordinates::linspace((0.0, 40.0), (0.0, 25.0), 150, 94);
    let mut engine = ParallelInterpolationEngine::new(EngineConfig::default()).unwrap();
    engine.interpolate(&samples, &grid, Method::Rbf, 0.1);
    c.bench_function("cached rbf 150x94", |b| b.iter(|| black_box(engine.interpolate(&samples, &grid, Method::Rbf, 0.1))));
}

criterion_group!(benches, run_methods, run_cached);
criterion_main!(benches);
