mod runtime;

mod test_benchmark;
