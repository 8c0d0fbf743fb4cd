mod similarity;
