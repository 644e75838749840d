use heatgrid::adaptive::{calculate_adaptive_smooth, calculate_resolution};
use heatgrid::{EngineConfig, Extent, Method, ParallelInterpolationEngine, SamplePoint, SampleSet, Source};

fn walk_survey() -> SampleSet
{
    // signal readings taken while walking a 20m x 12m floor
    SampleSet::from_points(&[
        SamplePoint::new(1.0, 1.0, 88.0),
        SamplePoint::new(5.0, 1.5, 74.0),
        SamplePoint::new(10.0, 2.0, 61.0),
        SamplePoint::new(15.0, 1.0, 47.0),
        SamplePoint::new(19.0, 2.5, 33.0),
        SamplePoint::new(2.0, 6.0, 79.0),
        SamplePoint::new(8.0, 6.5, 66.0),
        SamplePoint::new(13.0, 6.0, 52.0),
        SamplePoint::new(18.0, 7.0, 29.0),
        SamplePoint::new(3.0, 11.0, 58.0),
        SamplePoint::new(11.0, 10.5, 41.0),
        SamplePoint::new(17.5, 11.5, 18.0),
    ])
}

fn main()
{
    let samples = walk_survey();
    let area = Extent { x_min: 0.0, x_max: 20.0, y_min: 0.0, y_max: 12.0 };
    println!("resolution = {:?}", calculate_resolution(samples.len(), area.width(), area.height()));
    println!("smoothing = {}", calculate_adaptive_smooth(samples.signals()));

    let mut engine = ParallelInterpolationEngine::new(EngineConfig::default().with_chunk_size(16)).unwrap();
    for method in [Method::Rbf, Method::Idw, Method::Kriging]
    {
        let (grid, values) = engine.interpolate_area(&samples, area, method);
        let mean = values.mean().unwrap_or(0.0);
        println!("{method}: {:?} grid, mean signal {mean:.1}%", grid.shape());
    }

    let grid = heatgrid::GridCoordinates::linspace((0.0, 20.0), (0.0, 12.0), 30, 20);
    let result = engine.interpolate_detailed(&samples, &grid, Method::Kriging, 0.0, Some(&mut |done: usize, total: usize| println!("chunk {done}/{total}")));
    if let Source::Computed { method, fallbacks, .. } = &result.source
    {
        println!("computed with {method}, {} fallback(s)", fallbacks.len());
    }
    println!("{:?}", engine.cache_stats());
}
