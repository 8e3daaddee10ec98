pub type HashMap<K, V> = ahash::HashMap<K, V>;

pub type ImVec<T> = im::Vector<T>;
