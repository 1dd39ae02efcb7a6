//! Criterion benchmarks for thicket-trees: ensemble training and prediction.

use criterion::{Criterion, criterion_group, criterion_main};

use thicket_trees::{CategoryMap, Dataset, SelectionSet, TrainConfig, Value, ValueType};

/// Deterministic synthetic classification table: three informative numeric
/// columns (class * 3.0 plus a small hash-derived wobble), the rest noise.
fn make_classification(n_rows: usize, n_columns: usize, n_classes: usize) -> Dataset {
    let wobble = |row: usize, col: usize| {
        let h = (row.wrapping_mul(2654435761) ^ col.wrapping_mul(40503)) & 0xffff;
        h as f64 / 0xffff as f64 * 0.5
    };

    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(n_rows); n_columns + 1];
    let mut label_map = CategoryMap::new();
    for class in 0..n_classes {
        label_map.find_or_insert(&format!("class{class}"));
    }
    for row in 0..n_rows {
        let class = row % n_classes;
        for col in 0..n_columns {
            let base = if col < 3 { class as f64 * 3.0 } else { 0.0 };
            columns[col].push(Value::Number(base + wobble(row, col)));
        }
        columns[n_columns].push(Value::Level(class as i64));
    }

    let mut value_types = vec![ValueType::Numeric; n_columns];
    value_types.push(ValueType::Categorical);
    let mut maps = vec![CategoryMap::new(); n_columns];
    maps.push(label_map);
    let mut names: Vec<String> = (0..n_columns).map(|c| format!("f{c}")).collect();
    names.push("label".to_string());

    Dataset::new(columns, value_types, maps, names).unwrap()
}

fn bench_train(c: &mut Criterion) {
    let data = make_classification(500, 20, 5);
    let config = TrainConfig::new().with_max_trees(50).with_min_leaf_count(2);

    c.bench_function("train_500x20_5class_50subsets", |b| {
        b.iter(|| config.fit(data.clone(), 20).unwrap());
    });
}

fn bench_single_tree(c: &mut Criterion) {
    let data = make_classification(500, 20, 5);
    let config = TrainConfig::new()
        .with_max_trees(1)
        .with_columns_per_tree(Some(20))
        .with_min_leaf_count(2);

    c.bench_function("train_single_tree_500x20_5class", |b| {
        b.iter(|| config.fit(data.clone(), 20).unwrap());
    });
}

fn bench_predict(c: &mut Criterion) {
    let data = make_classification(500, 20, 5);
    let columns = data.columns().to_vec();
    let config = TrainConfig::new().with_max_trees(50).with_min_leaf_count(2);
    let model = config.fit(data, 20).unwrap().into_model();
    let rows = SelectionSet::with_all(500, true);

    c.bench_function("predict_500x20_50trees", |b| {
        b.iter(|| model.predict(&columns, &rows).unwrap());
    });
}

criterion_group!(benches, bench_train, bench_single_tree, bench_predict);
criterion_main!(benches);
