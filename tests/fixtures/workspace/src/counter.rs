fn main() {
    let mut counter = 0;
    counter += 1;
    println!("{counter}");
}
