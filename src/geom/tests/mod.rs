mod test_nurbs_basic;
mod test_patch_basic;
mod test_triangulation_basic;
