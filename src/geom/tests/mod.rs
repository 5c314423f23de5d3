mod test_optimize_basic;
