use std::collections::{HashMap, HashSet};
use targeting_tree::{Criterion, FlattenOptions, ForestNode, Target};

fn main() {
    let units = vec![
        Target::ad_unit("1").with_name("home"),
        Target::ad_unit("2").with_parent("1").with_name("home/us"),
        Target::ad_unit("3").with_parent("2").with_name("home/us/mi"),
        Target::ad_unit("4").with_parent("1").with_name("home/uk"),
    ];

    let mut forest = ForestNode::build(units.clone());
    println!("max depth: {:?}", forest.max_depth());

    let leaves = forest.flatten(&FlattenOptions::default().only_leaves()).unwrap();
    let names: Vec<_> = leaves.iter().filter_map(|unit| unit.name()).collect();
    println!("leaves: {names:?}");

    forest.update_external_names(&HashMap::from([("3".to_string(), "michigan".to_string())]));
    let michigan = forest.filter_tree(&HashSet::from(["michigan".to_string()]));
    println!("{}", michigan.to_doc().unwrap());

    let criterion = Criterion::from(units[1].clone()) & !Criterion::from(units[2].clone());
    println!("{}", criterion.to_doc().unwrap());
}
