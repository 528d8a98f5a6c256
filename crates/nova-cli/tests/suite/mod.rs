mod callgraph;
