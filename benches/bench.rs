// Criterion benchmarks for Tutor Pricing

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tutor_pricing::core::{calculate_similarity, select_population, GradeScale, PricingEngine, RegionTable};
use tutor_pricing::models::{
    CandidatePool, CandidateRecord, FactorWeights, PricePoint, PricingQuery, ProviderFactors,
    RawProviderRecord, RequesterFilters, SessionFormat,
};

const COUNTRIES: [&str; 5] = ["canada", "usa", "nigeria", "india", "germany"];

fn create_candidate(id: usize) -> ProviderFactors {
    ProviderFactors {
        provider_id: format!("c{}", id),
        rating: 3.0 + (id % 5) as f64 * 0.4,
        completion_rate: 0.5 + (id % 10) as f64 * 0.05,
        student_count: (id % 200) as u32,
        credentials_count: (id % 8) as u32,
        experience_score: (id % 8) as f64 * 5.0,
        account_age_days: 30 + (id % 1500) as u32,
        location: None,
        country: Some(COUNTRIES[id % COUNTRIES.len()].to_string()),
        grade_levels: vec![],
        grade_complexity: 1.0 + (id % 14) as f64,
        session_format: if id % 3 == 0 { SessionFormat::InPerson } else { SessionFormat::Online },
        price_per_hour: Some(20.0 + (id % 60) as f64),
    }
}

fn create_requester() -> ProviderFactors {
    ProviderFactors {
        price_per_hour: None,
        provider_id: "me".to_string(),
        ..create_candidate(7)
    }
}

fn bench_similarity(c: &mut Criterion) {
    let requester = create_requester();
    let candidate = create_candidate(42);
    let weights = FactorWeights::default();
    let regions = RegionTable::default();

    c.bench_function("calculate_similarity", |b| {
        b.iter(|| {
            calculate_similarity(
                black_box(&requester),
                black_box(&candidate),
                black_box(&weights),
                black_box(&regions),
            )
        });
    });
}

fn bench_suggest(c: &mut Criterion) {
    let engine = PricingEngine::with_default_config();
    let requester = create_requester();

    let mut group = c.benchmark_group("suggest");

    for candidate_count in [10, 100, 1000, 5000].iter() {
        let pool = CandidatePool::new((0..*candidate_count).map(create_candidate).collect());

        group.bench_with_input(
            BenchmarkId::new("suggest", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| engine.suggest(black_box(requester.clone()), black_box(&pool)));
            },
        );
    }

    group.finish();
}

fn bench_population(c: &mut Criterion) {
    let now = Utc::now();
    let scale = GradeScale::default();
    let query = PricingQuery {
        requester_id: "me".to_string(),
        time_period_months: 3,
        filters: RequesterFilters::default(),
    };

    let records: Vec<CandidateRecord> = (0..1000)
        .map(|i| CandidateRecord {
            profile: RawProviderRecord {
                provider_id: format!("c{}", i),
                rating: Some(4.0),
                review_count: Some(3),
                grade_levels: vec!["high_school".to_string()],
                ..Default::default()
            },
            listings: vec![],
            price_points: (0..5)
                .map(|d| PricePoint {
                    provider_id: format!("c{}", i),
                    price_per_hour: 30.0 + d as f64,
                    observed_at: now - Duration::days(d * 30),
                })
                .collect(),
        })
        .collect();

    c.bench_function("select_population_1000_records", |b| {
        b.iter(|| select_population(black_box(records.clone()), &query, &scale, now));
    });
}

criterion_group!(benches, bench_similarity, bench_suggest, bench_population);

criterion_main!(benches);
