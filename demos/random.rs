use slot_hungarian::Allocations;

const ASSIGNMENT_SIZE: usize = 64;
const N: usize = 100;

fn main() {
    let mut assignments = Allocations::default();
    let mut total_cost = 0.;
    let mut unsolved = 0;
    for _ in 0..N {
        // rectangular on purpose: one column per row plus some slack
        let costs = nalgebra::DMatrix::<f64>::new_random(ASSIGNMENT_SIZE, ASSIGNMENT_SIZE + 8);
        match slot_hungarian::hungarian(&costs, &mut assignments) {
            Some(cost) => total_cost += cost,
            None => unsolved += 1,
        }
    }

    println!("total: {total_cost}");
    println!("unsolved: {unsolved}");
}
